//! Integration tests exercising the full reduction pipeline:
//! physical Hamiltonian → modal form → normal form → center manifold,
//! across module boundaries.

use cm_core::{
    BatchEvaluator, CenterManifold, CollinearKind, CollinearPoint, ExpansionDirection,
    GradedPoly, IndexTables, NormalFormConfig, RunSnapshot, Stage, compute_center_manifold,
    evaluate_transform, export_json, import_json, lie_expansion,
};
use num_complex::Complex64;

const MU_EM: f64 = 0.012150585609624;

fn l1_manifold(max_degree: usize) -> CenterManifold {
    let point = CollinearPoint::new(CollinearKind::L1, MU_EM).unwrap();
    CenterManifold::new(point, NormalFormConfig::default().with_max_degree(max_degree)).unwrap()
}

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

fn is_bad(k: &[u32; 6]) -> bool {
    k[0] != k[3]
}

/// Test 1: every term with unequal powers of q1 and p1 is gone after
/// normalization, and the quadratic part is left alone.
#[test]
fn normal_form_eliminates_hyperbolic_coupling() {
    for max in [3, 4, 6, 8] {
        let mut cm = l1_manifold(max);
        let h_cn = cm.complex_modal_hamiltonian().unwrap().clone();
        let h_nf = cm.complex_normal_form().unwrap().clone();
        let tables = cm.tables().clone();

        for n in 3..=max {
            let block = h_nf.block(n).unwrap();
            for (pos, coeff) in block.iter().enumerate() {
                let k = tables.decode(pos, n).unwrap();
                if is_bad(&k) {
                    assert!(
                        coeff.norm() < 1e-15,
                        "degree {n}, exponents {k:?}: {coeff}"
                    );
                }
            }
        }

        assert_eq!(h_nf.block(2).unwrap(), h_cn.block(2).unwrap());
    }
}

/// Test 2: H_nf(y) = H_cn(Phi(y)) where Phi is the forward expansion.
#[test]
fn forward_expansion_conjugates_hamiltonians() {
    let max = 6;
    let mut cm = l1_manifold(max);
    let h_cn = cm.complex_modal_hamiltonian().unwrap().clone();
    let h_nf = cm.complex_normal_form().unwrap().clone();
    let bundle = cm.bundle().unwrap().clone();
    let tables = cm.tables().clone();

    let forward =
        lie_expansion(&bundle, ExpansionDirection::Forward, &tables, 1e-30, false).unwrap();
    let y = [
        c(1e-3, 2e-4),
        c(-7e-4, 5e-4),
        c(4e-4, -3e-4),
        c(6e-4, 1e-4),
        c(-2e-4, 8e-4),
        c(9e-4, -6e-4),
    ];
    let z = evaluate_transform(&forward, &y, &tables).unwrap();

    let lhs = h_nf.evaluate(&tables, &y).unwrap();
    let rhs = h_cn.evaluate(&tables, &z).unwrap();
    assert!(
        (lhs - rhs).norm() <= 1e-9 * lhs.norm(),
        "H_nf(y) = {lhs}, H_cn(Phi(y)) = {rhs}"
    );
}

/// Test 3: the inverse expansion undoes the forward one to truncation order.
#[test]
fn inverse_undoes_forward() {
    let max = 6;
    let mut cm = l1_manifold(max);
    let bundle = cm.bundle().unwrap().clone();
    let tables = cm.tables().clone();

    let forward =
        lie_expansion(&bundle, ExpansionDirection::Forward, &tables, 1e-30, false).unwrap();
    let inverse =
        lie_expansion(&bundle, ExpansionDirection::Inverse, &tables, 1e-30, false).unwrap();

    let y = [
        c(5e-4, 0.0),
        c(-3e-4, 2e-4),
        c(2e-4, 1e-4),
        c(-4e-4, 0.0),
        c(1e-4, -2e-4),
        c(3e-4, 3e-4),
    ];
    let z = evaluate_transform(&forward, &y, &tables).unwrap();
    let back = evaluate_transform(&inverse, &z, &tables).unwrap();
    for (a, b) in y.iter().zip(&back) {
        assert!((a - b).norm() < 1e-12, "{a} vs {b}");
    }
}

/// Test 4: mapping a center-manifold point to physical coordinates
/// preserves the energy.
#[test]
fn cm_point_to_local_preserves_energy() {
    let max = 6;
    let mut cm = l1_manifold(max);
    let h_cm = cm.compute().unwrap().clone();
    let h_phys = cm.physical_hamiltonian().unwrap().clone();
    let tables = cm.tables().clone();

    let cm_point = [1e-3, -2e-3, 1.5e-3, 5e-4];
    let local = cm.cm_point_to_local(&cm_point).unwrap();
    assert!(local.iter().all(|v| v.is_finite()));

    // H_cm is stored in (q1, q2, q3, p1, p2, p3) with q1 = p1 = 0.
    let [q2, p2, q3, p3] = cm_point;
    let cm_full = [0.0, q2, q3, 0.0, p2, p3].map(|v| c(v, 0.0));
    let e_cm = h_cm.evaluate(&tables, &cm_full).unwrap();
    let e_phys = h_phys.evaluate(&tables, &local.map(|v| c(v, 0.0))).unwrap();

    assert!(e_cm.im.abs() < 1e-10 * (1.0 + e_cm.re.abs()));
    assert!(
        (e_cm.re - e_phys.re).abs() <= 1e-8 * e_cm.re.abs(),
        "H_cm = {}, H_phys = {}",
        e_cm.re,
        e_phys.re
    );
}

/// Test 5: the free-function pipeline agrees with the cached one.
#[test]
fn free_pipeline_matches_cached_pipeline() {
    let max = 5;
    let mut cm = l1_manifold(max);
    let cached = cm.compute().unwrap().clone();
    let h_phys = cm.physical_hamiltonian().unwrap().clone();

    let tables = IndexTables::new(max).unwrap();
    let config = NormalFormConfig::default().with_max_degree(max);
    let (h_cm, bundle) = compute_center_manifold(&h_phys, cm.data(), &tables, &config).unwrap();

    assert_eq!(bundle.max_degree(), max);
    for d in 0..=max {
        for (a, b) in h_cm.block(d).unwrap().iter().zip(cached.block(d).unwrap()) {
            assert!((a - b).norm() <= 1e-12 * (1.0 + a.norm()));
        }
    }
}

/// Test 6: the center-manifold Hamiltonian is real, free of the hyperbolic
/// pair, and starts with the two harmonic oscillators.
#[test]
fn center_manifold_is_real_and_starts_at_harmonic_oscillators() {
    let mut cm = l1_manifold(4);
    let data = cm.data().clone();
    let h = cm.compute().unwrap().clone();
    let tables = cm.tables().clone();

    for d in 0..=4 {
        for (pos, coeff) in h.block(d).unwrap().iter().enumerate() {
            assert!(coeff.im.abs() < 1e-10 * (1.0 + coeff.re.abs()));
            let k = tables.decode(pos, d).unwrap();
            if coeff.norm() > 1e-14 {
                assert_eq!(k[0], 0, "q1 in center manifold: {k:?}");
                assert_eq!(k[3], 0, "p1 in center manifold: {k:?}");
            }
        }
    }

    let h2 = h.block(2).unwrap();
    let at = |k: [u32; 6]| h2[tables.encode(&k, 2).unwrap()].re;
    assert!((at([0, 2, 0, 0, 0, 0]) - data.omega1 / 2.0).abs() < 1e-12);
    assert!((at([0, 0, 0, 0, 2, 0]) - data.omega1 / 2.0).abs() < 1e-12);
    assert!((at([0, 0, 2, 0, 0, 0]) - data.omega2 / 2.0).abs() < 1e-12);
    assert!((at([0, 0, 0, 0, 0, 2]) - data.omega2 / 2.0).abs() < 1e-12);
}

/// Test 7: changing the degree clears the cache and recomputes.
#[test]
fn set_max_degree_recomputes() {
    let mut cm = l1_manifold(6);
    assert_eq!(cm.compute().unwrap().max_degree(), 6);

    cm.set_max_degree(4).unwrap();
    let lowered = cm.compute().unwrap().clone();
    assert_eq!(lowered.max_degree(), 4);

    let mut fresh = l1_manifold(4);
    let expected = fresh.compute().unwrap();
    for d in 0..=4 {
        for (a, b) in lowered.block(d).unwrap().iter().zip(expected.block(d).unwrap()) {
            assert!((a - b).norm() <= 1e-12 * (1.0 + a.norm()));
        }
    }
}

/// Test 8: a run survives export, import and reconstruction.
#[test]
fn run_roundtrip_rebuilds_manifold() {
    let mut cm = l1_manifold(4);
    let stages = cm.stages().unwrap();
    let run = RunSnapshot::new(*cm.point(), *cm.config(), stages);

    let json = export_json(&run).unwrap();
    let back = import_json(&json).unwrap();
    assert_eq!(back.id, run.id);

    let mut rebuilt = CenterManifold::from_stages(back.point, back.config, back.stages).unwrap();
    assert_eq!(
        rebuilt.compute().unwrap(),
        run.stages.get(Stage::CenterManifoldReal)
    );
}

/// Test 9: batch evaluation over the center-manifold Hamiltonian agrees
/// with direct evaluation.
#[test]
fn batch_evaluator_on_center_manifold() {
    let mut cm = l1_manifold(5);
    let h: GradedPoly = cm.compute().unwrap().clone();
    let tables = cm.tables().clone();

    let points: Vec<[Complex64; 6]> = (0..32)
        .map(|i| {
            let s = 1e-3 * (i as f64 + 1.0) / 32.0;
            [0.0, s, -s, 0.0, 0.5 * s, 2.0 * s].map(|v| c(v, 0.0))
        })
        .collect();

    let evaluator = BatchEvaluator::new(std::slice::from_ref(&h), &tables).unwrap();
    let batch = evaluator.evaluate_single(0, &points).unwrap();
    for (p, value) in points.iter().zip(&batch) {
        let direct = h.evaluate(&tables, p).unwrap();
        assert!((direct - value).norm() <= 1e-12 * (1.0 + direct.norm()));
    }
}
