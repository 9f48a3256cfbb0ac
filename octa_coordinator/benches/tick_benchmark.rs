//! Arbiter tick benchmark: the steady-state control-law pass.
//!
//! The tick period is 5 ms; a pass with nothing to dispatch (drain the
//! empty event queue, take the lock, expire pulses, fold the command
//! snapshot) must stay far under that so a busy tick keeps the period
//! for real work. The recipe case measures the heaviest steady state:
//! banner formatting plus the mode-settle check on every tick.

use criterion::{Criterion, criterion_group, criterion_main};

use octa_common::console::ConsoleCommand;
use octa_common::mode::Mode;
use octa_coordinator::arbiter::Arbiter;
use octa_coordinator::sim::SimRig;
use octa_coordinator::state::ControlContext;

fn bench_tick(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("arbiter_tick");
    group.significance_level(0.01);
    group.sample_size(500);

    {
        let ctx = ControlContext::new(Default::default());
        let rig = SimRig::level();
        let mut arbiter = Arbiter::new(ctx, rig.motion(), rig.vision(55.0));
        group.bench_function("idle", |b| {
            b.iter(|| rt.block_on(arbiter.tick()));
        });
    }

    {
        let ctx = ControlContext::new(Default::default());
        let rig = SimRig::level();
        // Recipe armed but the mode mirror never matches, so every tick
        // re-formats the step banner and re-arms the settle window
        // without dispatching a goal.
        let mut cmd = ConsoleCommand::default();
        cmd.full_scan = true;
        cmd.mode = Mode::Octa;
        ctx.ingest_command(cmd);
        let mut arbiter = Arbiter::new(ctx, rig.motion(), rig.vision(55.0));
        group.bench_function("recipe_settling", |b| {
            b.iter(|| rt.block_on(arbiter.tick()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
