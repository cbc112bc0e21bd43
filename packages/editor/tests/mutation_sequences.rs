//! Multi-step editing sequences: undo/redo round trips, history bounds and
//! invariant preservation under random intents

use pagecraft_editor::{
    BlockId, Direction, EditSession, EditorConfig, Mutation, Props, SequentialIds,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn session(config: EditorConfig) -> EditSession {
    init_tracing();
    EditSession::builder(config)
        .with_id_generator(SequentialIds::from_seed("seq"))
        .build()
}

fn texts(n: usize) -> Vec<Mutation> {
    (0..n)
        .map(|i| {
            let mut props = Props::new();
            props.insert("text".to_string(), json!(format!("Paragraph {i}")));
            Mutation::AddBlock {
                component_name: "text".to_string(),
                insert_at: None,
                props: Some(props),
                parent_id: None,
            }
        })
        .collect()
}

#[test]
fn test_undo_then_redo_round_trip() {
    let mut session = session(EditorConfig::default());
    let mut states = vec![session.snapshot()];

    for mutation in texts(8) {
        assert!(session.apply(mutation).is_applied());
        states.push(session.snapshot());
    }

    for expected in states.iter().rev().skip(1) {
        assert!(session.undo());
        assert_eq!(&session.snapshot(), expected);
    }
    assert!(!session.can_undo());
    assert!(!session.undo());

    for expected in states.iter().skip(1) {
        assert!(session.redo());
        assert_eq!(&session.snapshot(), expected);
    }
    assert!(!session.can_redo());
}

#[test]
fn test_new_edit_after_undo_drops_redo_branch() {
    let mut session = session(EditorConfig::default());
    for mutation in texts(3) {
        session.apply(mutation);
    }

    session.undo();
    session.undo();
    assert!(session.can_redo());
    assert_eq!(session.redo_description(), Some("add"));

    let first = session.roots()[0].id.clone();
    session.delete_block(&first);

    assert!(!session.can_redo());
    assert!(session.blocks().is_empty());
    assert_eq!(session.undo_description(), Some("delete"));
}

#[test]
fn test_history_is_bounded() {
    let mut session = session(EditorConfig::default());
    for mutation in texts(60) {
        session.apply(mutation);
    }

    let mut undos = 0;
    while session.undo() {
        undos += 1;
    }

    assert_eq!(undos, 49);
    assert_eq!(session.history().len(), 50);
    // The oldest reachable state already holds eleven blocks
    assert_eq!(session.blocks().len(), 11);
}

#[test]
fn test_custom_history_limit() {
    let config = EditorConfig {
        history_limit: 3,
        ..EditorConfig::default()
    };
    let mut session = session(config);
    for mutation in texts(5) {
        session.apply(mutation);
    }

    assert!(session.undo());
    assert!(session.undo());
    assert!(!session.undo());
    assert_eq!(session.blocks().len(), 3);
}

#[test]
fn test_undo_clears_vanished_selection() {
    let mut session = session(EditorConfig::default());
    let first = session.add_block("text", None, None, None).created()[0].clone();
    let second = session.add_block("text", None, None, None).created()[0].clone();
    assert_eq!(session.selected_block_id(), Some(&second));

    assert!(session.undo());

    assert_eq!(session.selected_block_id(), None);
    assert!(session.blocks().contains(&first));
    session.check_invariants().unwrap();
}

#[test]
fn test_cosmetic_edits_can_skip_history() {
    let config = EditorConfig {
        record_cosmetic_edits: false,
        ..EditorConfig::default()
    };
    let mut session = session(config);
    let id = session.add_block("text", None, None, None).created()[0].clone();

    assert!(session.set_visibility(&id, false).is_applied());
    assert_eq!(session.undo_description(), Some("add"));
}

#[test]
fn test_reorder_and_move_keep_groups_dense() {
    let mut session = session(EditorConfig::default());
    for mutation in texts(4) {
        session.apply(mutation);
    }
    let ids: Vec<BlockId> = session.roots().iter().map(|b| b.id.clone()).collect();

    assert!(session.reorder_blocks(0, 3).is_applied());
    let order: Vec<BlockId> = session.roots().iter().map(|b| b.id.clone()).collect();
    assert_eq!(order, vec![ids[1].clone(), ids[2].clone(), ids[3].clone(), ids[0].clone()]);

    assert!(session.move_block(&ids[0], Direction::Up).is_applied());
    let order: Vec<BlockId> = session.roots().iter().map(|b| b.id.clone()).collect();
    assert_eq!(order, vec![ids[1].clone(), ids[2].clone(), ids[0].clone(), ids[3].clone()]);

    assert!(!session.move_block(&ids[1], Direction::Up).is_applied());
    for (rank, block) in session.roots().iter().enumerate() {
        assert_eq!(block.sort_order as usize, rank);
    }
}

fn random_mutation(rng: &mut StdRng, session: &EditSession) -> Mutation {
    let ids: Vec<BlockId> = session.blocks().iter().map(|b| b.id.clone()).collect();
    let pick = |rng: &mut StdRng| -> BlockId {
        if ids.is_empty() || rng.gen_bool(0.1) {
            BlockId::from("missing")
        } else {
            ids[rng.gen_range(0..ids.len())].clone()
        }
    };
    let maybe_parent = |rng: &mut StdRng| -> Option<BlockId> {
        if ids.is_empty() || rng.gen_bool(0.4) {
            None
        } else {
            Some(ids[rng.gen_range(0..ids.len())].clone())
        }
    };

    match rng.gen_range(0..12) {
        0 | 1 | 2 => Mutation::AddBlock {
            component_name: "box".to_string(),
            insert_at: rng.gen_bool(0.5).then(|| rng.gen_range(0..4)),
            props: None,
            parent_id: maybe_parent(rng),
        },
        3 => Mutation::UpdateBlock {
            id: pick(rng),
            props: Props::from_iter([("n".to_string(), json!(rng.gen::<u8>()))]),
        },
        4 => Mutation::SetVisibility {
            id: pick(rng),
            visible: rng.gen_bool(0.5),
        },
        5 => Mutation::DeleteBlock { id: pick(rng) },
        6 => Mutation::DuplicateBlock { id: pick(rng) },
        7 => Mutation::ReorderBlocks {
            start_index: rng.gen_range(0..ids.len() + 1),
            end_index: rng.gen_range(0..ids.len() + 1),
        },
        8 => Mutation::MoveBlock {
            id: pick(rng),
            direction: if rng.gen_bool(0.5) {
                Direction::Up
            } else {
                Direction::Down
            },
        },
        9 => Mutation::MoveToContainer {
            id: pick(rng),
            target_container_id: maybe_parent(rng),
            insert_at: rng.gen_bool(0.5).then(|| rng.gen_range(0..4)),
        },
        10 => Mutation::CopyBlock { id: pick(rng) },
        _ => Mutation::PasteBlock {
            parent_id: maybe_parent(rng),
            insert_at: None,
        },
    }
}

#[test]
fn test_random_sequences_preserve_invariants() {
    init_tracing();

    for seed in 0..16u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut session = session(EditorConfig::default());

        for step in 0..200 {
            match rng.gen_range(0..10) {
                0 => {
                    session.undo();
                }
                1 => {
                    session.redo();
                }
                _ => {
                    let mutation = random_mutation(&mut rng, &session);
                    session.apply(mutation);
                }
            }

            if let Err(violation) = session.check_invariants() {
                panic!("seed {seed}, step {step}: {violation}");
            }
        }
    }
}

#[test]
fn test_random_sequences_undo_to_start() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let config = EditorConfig {
        history_limit: 1000,
        ..EditorConfig::default()
    };
    let mut session = session(config);
    let start = session.to_json()?;

    for _ in 0..100 {
        let mutation = random_mutation(&mut rng, &session);
        session.apply(mutation);
    }

    while session.undo() {}
    assert_eq!(session.to_json()?, start);
    Ok(())
}
