//! End-to-end exercise of the backend: schema registration, tick loop,
//! ring eviction, tail overwrite, tensor query and CSV dump.

use orrery_runtime::{Backend, BackendConfig, ResultShape};

#[test]
fn test_backend_roundtrip() {
    let mut backend = Backend::new(BackendConfig {
        initial_cells: 64,
        max_snapshots: 3,
    })
    .unwrap();

    let frame = backend.frame();
    let (city, population, traffic) = {
        let mut frame = frame.borrow_mut();
        let city = frame.add_node("city", 2);
        let population = frame.add_attr(city, "population", 1).unwrap();
        let traffic = frame.add_attr(city, "traffic", 2).unwrap();
        (city, population, traffic)
    };
    backend.setup();

    // Five ticks against a ring of three.
    for tick in 0..5u64 {
        {
            let mut frame = frame.borrow_mut();
            for city_index in 0..2u16 {
                frame
                    .set_value(
                        city,
                        city_index,
                        population,
                        0,
                        100.0 * tick as f64 + city_index as f64,
                    )
                    .unwrap();
                frame
                    .set_value(city, city_index, traffic, 0, tick as f64)
                    .unwrap();
            }
        }
        backend.take_snapshot(tick).unwrap();
    }

    assert_eq!(backend.snapshots().size(), 3);
    assert_eq!(backend.snapshots().ticks(), vec![2, 3, 4]);
    assert!(backend.snapshots().get(1, city, 0, population, 0).is_nan());

    // Overwriting the newest tick replaces its contents in place.
    frame
        .borrow_mut()
        .set_value(city, 0, population, 0, 999.0)
        .unwrap();
    backend.take_snapshot(4).unwrap();
    assert_eq!(backend.snapshots().size(), 3);
    assert_eq!(backend.snapshots().get(4, city, 0, population, 0).value(), 999.0);
    assert_eq!(backend.snapshots().get(3, city, 0, population, 0).value(), 300.0);

    // Dense [tick x node x attr x slot] extraction.
    let shape = backend
        .snapshots_mut()
        .prepare(city, None, None, &[population, traffic])
        .unwrap();
    assert_eq!(
        shape,
        ResultShape {
            tick_number: 3,
            max_node_number: 2,
            attr_number: 2,
            max_slot_number: 2,
        }
    );

    let mut result = vec![0.0; shape.len()];
    backend.snapshots_mut().query(&mut result, shape).unwrap();

    let index = |t: usize, n: usize, a: usize, s: usize| ((t * 2 + n) * 2 + a) * 2 + s;
    // tick 2, city 1, population
    assert_eq!(result[index(0, 1, 0, 0)], 201.0);
    // tick 4, city 0, population reflects the overwrite
    assert_eq!(result[index(2, 0, 0, 0)], 999.0);
    // tick 3, city 1, traffic slot 0
    assert_eq!(result[index(1, 1, 1, 0)], 3.0);
    // traffic slot 1 was never written: pre-filled zero survives
    assert_eq!(result[index(1, 1, 1, 1)], 0.0);

    // CSV dump writes one file per node type.
    let dir = tempfile::tempdir().unwrap();
    backend.snapshots().dump(dir.path()).unwrap();
    let contents = std::fs::read_to_string(dir.path().join("snapshots_city.csv")).unwrap();

    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("tick,node_index,population,traffic"));
    assert_eq!(lines.next(), Some("2,0,200,\"[2,nan,]\""));
    // 3 ticks x 2 instances follow the header.
    assert_eq!(contents.lines().count(), 7);
}
