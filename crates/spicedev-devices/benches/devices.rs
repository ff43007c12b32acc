//! Benchmarks for EKV evaluation and full model loads.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use nalgebra::DVector;
use spicedev_core::constants::REFTEMP;
use spicedev_core::{CircuitContext, MnaMatrix, NodeId, NodeTable, StateAllocator};
use spicedev_devices::Stamp;
use spicedev_devices::ekv::{
    EkvDerived, EkvInstance, EkvInstanceParams, EkvModel, EkvModelParams, evaluate,
};
use spicedev_devices::param::Given;

fn params() -> EkvModelParams {
    let mut p = EkvModelParams::nmos();
    p.vto = Given::new(0.5);
    p.kp = Given::new(1e-4);
    p
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("ekv_evaluate");
    let model = params().resolve(REFTEMP);
    let inst = EkvInstanceParams::with_geometry(10e-6, 1e-6).resolve(REFTEMP);
    let derived = EkvDerived::compute("M1", &model, &inst);

    for (label, vgs) in [("weak", 0.2), ("moderate", 0.6), ("strong", 1.5)] {
        group.bench_with_input(BenchmarkId::from_parameter(label), &vgs, |bencher, &vgs| {
            bencher.iter(|| {
                evaluate(
                    black_box(&model),
                    black_box(&derived),
                    black_box(vgs),
                    black_box(1.0),
                    black_box(0.0),
                )
            });
        });
    }

    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("ekv_load");

    for count in [1, 10, 100] {
        // Inverter-like chain: each instance drives the gate of the next.
        let mut table = NodeTable::new();
        let first = table.add("in");
        let mut model = EkvModel::new("nch", params());
        let mut gate = first;
        for i in 0..count {
            let drain = table.add(format!("n{i}"));
            model.add_instance(EkvInstance::new(
                format!("M{i}"),
                drain,
                gate,
                NodeId::GROUND,
                NodeId::GROUND,
                EkvInstanceParams::with_geometry(10e-6, 1e-6),
            ));
            gate = drain;
        }

        let mut alloc = StateAllocator::new();
        model.setup(&mut table, &mut alloc).unwrap();
        let mut matrix = MnaMatrix::new(table.num_nodes());
        model.bind(&mut matrix).unwrap();
        let mut ctx = CircuitContext::new(table.num_nodes());
        model.temperature(&ctx);
        for n in 1..=table.num_nodes() {
            ctx.set_voltage(NodeId::new(n as u32), 0.9);
        }
        let mut states = alloc.into_history(3);
        let mut rhs = DVector::zeros(table.num_nodes() + 1);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |bencher, _| {
            bencher.iter(|| {
                matrix.clear();
                rhs.fill(0.0);
                model
                    .load(black_box(&ctx), &mut states, &mut matrix, &mut rhs)
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_load);
criterion_main!(benches);
