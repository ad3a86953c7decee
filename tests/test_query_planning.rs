mod common;

use std::f64::consts::PI;

use common::{clustered_points, uniform_points};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skypart::coordinates::{angular_separation, SkyPoint};
use skypart::healpix::{neighbours_of, pixel_of, Nside};
use skypart::partitioning::{AdaptivePartitioner, PartitionParams};
use skypart::query::disc::candidate_partitions_for_radius;
use skypart::query::neighborhood::candidate_partitions_for_nearest;

#[test]
fn test_nearest_candidates_hold_own_cell_and_neighbours() {
    let nside = Nside::new(64).unwrap();
    for p in uniform_points(500, 1) {
        let own = pixel_of(&p, nside);
        let cells = candidate_partitions_for_nearest(&p, nside);
        assert_eq!(cells[0], own);
        for n in neighbours_of(own, nside).unwrap() {
            assert!(cells.contains(&n), "{n} missing around {own}");
        }
    }
}

#[test]
fn test_close_points_fall_in_candidate_cells() {
    let nside = Nside::new(64).unwrap();
    let step = 0.1 * nside.pixel_side().to_degrees();
    let mut rng = StdRng::seed_from_u64(21);
    for _ in 0..500 {
        let p = SkyPoint::new(rng.random_range(0.0..360.0), rng.random_range(-80.0..80.0));
        let cells = candidate_partitions_for_nearest(&p, nside);
        let angle: f64 = rng.random_range(0.0..2.0 * PI);
        let q = SkyPoint::new(
            p.ra + step * angle.cos() / p.dec.to_radians().cos(),
            p.dec + step * angle.sin(),
        );
        assert!(cells.contains(&pixel_of(&q, nside)));
    }
}

#[test]
fn test_disc_cover_extremes() {
    let nside = Nside::new(64).unwrap();
    for p in uniform_points(100, 8) {
        assert!(candidate_partitions_for_radius(&p, 0.0, nside).contains(&pixel_of(&p, nside)));
    }
    let all = candidate_partitions_for_radius(&SkyPoint::new(12.0, -7.0), PI, nside);
    assert_eq!(all.len() as u64, nside.npix());
    assert_eq!(all, (0..nside.npix()).collect::<Vec<_>>());
}

#[test]
fn test_layout_cone_keys_cover_every_point_in_radius() {
    let params = PartitionParams::builder()
        .base_nside(32)
        .fine_nside(128)
        .density_threshold(40)
        .build()
        .unwrap();
    let center = SkyPoint::new(150.0, 2.0);
    let mut points = uniform_points(4_000, 31);
    points.extend(clustered_points(center, 2.0, 2_000, 32));
    let a = AdaptivePartitioner::new(params).assign_detailed(&points);
    assert_eq!(a.skipped(), 0);
    assert!(!a.layout.refined_cells().is_empty());

    let mut rng = StdRng::seed_from_u64(33);
    for _ in 0..20 {
        let q = SkyPoint::new(
            center.ra + rng.random_range(-2.0..2.0),
            center.dec + rng.random_range(-2.0..2.0),
        );
        let radius = rng.random_range(0.0..1.5f64).to_radians();
        let keys = a.layout.keys_for_cone(&q, radius).unwrap();
        for (p, key) in points.iter().zip(a.keys.iter().flatten()) {
            if angular_separation(&q, p) <= radius {
                assert!(keys.binary_search(key).is_ok(), "{p:?} with key {key} missed");
            }
        }
    }
}

#[test]
fn test_layout_nearest_keys_hold_neighbouring_points() {
    let params = PartitionParams::builder()
        .base_nside(32)
        .fine_nside(128)
        .density_threshold(40)
        .build()
        .unwrap();
    let center = SkyPoint::new(200.0, -20.0);
    let points = clustered_points(center, 3.0, 3_000, 41);
    let a = AdaptivePartitioner::new(params).assign_detailed(&points);

    let step = 0.1 * params.fine_nside().pixel_side();
    assert_eq!(a.skipped(), 0);
    for p in points.iter().take(200) {
        let keys = a.layout.keys_for_nearest(p).unwrap();
        let own = a.layout.key_for(p);
        assert!(keys.contains(&own));
        for (other, key) in points.iter().zip(a.keys.iter().flatten()) {
            if angular_separation(p, other) <= step {
                assert!(keys.contains(key));
            }
        }
    }
}
