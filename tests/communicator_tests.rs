use mesh_forest::prelude::*;
use serial_test::serial;

// `RayonComm::new` shares one process-wide mailbox
fn rayons() -> (RayonComm, RayonComm) {
    (RayonComm::new(0, 2), RayonComm::new(1, 2))
}

#[test]
#[serial]
fn shared_mailbox_round_trip() {
    let (c0, c1) = rayons();
    let mut buf = [0u8; 5];
    let recv = c1.irecv(0, 0x70, &mut buf);
    c0.isend(1, 0x70, b"ghost");
    assert_eq!(recv.wait().as_deref(), Some(&b"ghost"[..]));
}

#[test]
#[serial]
fn shared_mailbox_keeps_fifo_order() {
    let (c0, c1) = rayons();
    for msg in [b"one", b"two"] {
        c0.isend(1, 0x71, msg);
    }
    let mut buf = [0u8; 3];
    let first = c1.irecv(0, 0x71, &mut buf).wait();
    let second = c1.irecv(0, 0x71, &mut buf).wait();
    assert_eq!(first.as_deref(), Some(&b"one"[..]));
    assert_eq!(second.as_deref(), Some(&b"two"[..]));
}

#[test]
#[serial]
fn ghost_build_over_the_shared_mailbox() {
    use std::sync::Arc;

    let conn = Arc::new(builtin::two_cubes().unwrap());
    let f0 = Forest::new_uniform(conn.clone(), 1, 0, 2).unwrap();
    let f1 = Forest::new_uniform(conn, 1, 1, 2).unwrap();
    let (c0, c1) = rayons();
    let (g0, g1) = std::thread::scope(|s| {
        let h = s.spawn(|| ghost_new(&f1, &c1, NeighborClass::Face).unwrap());
        let g0 = ghost_new(&f0, &c0, NeighborClass::Face).unwrap();
        (g0, h.join().unwrap())
    });
    assert_eq!(g0.len(), 4);
    assert_eq!(g1.len(), 4);
}
