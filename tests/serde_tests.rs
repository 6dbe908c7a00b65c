mod util;

use std::sync::Arc;

use mesh_forest::prelude::*;
use util::{run_ranks, uniform_forests};

#[test]
fn connectivity_round_trips_through_json_and_bincode() {
    for conn in [
        builtin::rot_cubes().unwrap(),
        builtin::shell().unwrap(),
        builtin::brick([2, 3, 1], [true, false, false]).unwrap(),
    ] {
        let arrays = conn.to_arrays();
        let json = serde_json::to_string(&arrays).unwrap();
        let back: ConnectivityArrays = serde_json::from_str(&json).unwrap();
        assert_eq!(back, arrays);

        let bytes = bincode::serialize(&conn).unwrap();
        let graph: ConnectivityGraph = bincode::deserialize(&bytes).unwrap();
        assert_eq!(graph, conn);
        graph.validate_invariants().unwrap();
    }
}

#[test]
fn corrupt_arrays_fail_to_deserialize() {
    let mut arrays = builtin::two_cubes().unwrap().to_arrays();
    // tree 0 face 1 now claims to reach face 2 of tree 1, a boundary face
    arrays.tree_to_face[1] = 2;
    let json = serde_json::to_string(&arrays).unwrap();
    assert!(serde_json::from_str::<ConnectivityGraph>(&json).is_err());
}

#[test]
fn ghost_layer_round_trips_through_bincode() {
    let conn = Arc::new(builtin::two_cubes().unwrap());
    let forests = uniform_forests(&conn, 2, 2);
    let layers = run_ranks(2, |comm| {
        ghost_new(&forests[comm.rank()], &comm, NeighborClass::Full).unwrap()
    });
    for layer in layers {
        let bytes = bincode::serialize(&layer).unwrap();
        let back: GhostLayer = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, layer);
        assert_eq!(back.class(), NeighborClass::Full);
    }
}
