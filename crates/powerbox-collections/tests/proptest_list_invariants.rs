#![forbid(unsafe_code)]

//! Property tests for `ListBox`.
//!
//! 1. Any sequence of operations leaves the box equal to a `Vec` that went
//!    through the same operations.
//! 2. The box notifies exactly once per operation that changed it.
//! 3. Out-of-range indices never panic and never notify.

use std::sync::{Arc, Mutex};

use powerbox_collections::ListBox;
use powerbox_core::{Boxes, Scope, WrapperBox, change_observer};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum ListOp {
    Push(i16),
    Pop,
    Insert(usize, i16),
    Remove(usize),
    ReplaceAt(usize, i16),
    RetainEven,
    Truncate(usize),
    Clear,
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        3 => any::<i16>().prop_map(ListOp::Push),
        1 => Just(ListOp::Pop),
        2 => (0usize..12, any::<i16>()).prop_map(|(at, v)| ListOp::Insert(at, v)),
        2 => (0usize..12).prop_map(ListOp::Remove),
        2 => (0usize..12, any::<i16>()).prop_map(|(at, v)| ListOp::ReplaceAt(at, v)),
        1 => Just(ListOp::RetainEven),
        1 => (0usize..12).prop_map(ListOp::Truncate),
        1 => Just(ListOp::Clear),
    ]
}

/// Applies `op` to the model; returns whether the model changed.
fn apply_to_model(model: &mut Vec<i16>, op: &ListOp) -> bool {
    match *op {
        ListOp::Push(v) => {
            model.push(v);
            true
        }
        ListOp::Pop => model.pop().is_some(),
        ListOp::Insert(at, v) => {
            if at > model.len() {
                return false;
            }
            model.insert(at, v);
            true
        }
        ListOp::Remove(at) => {
            if at >= model.len() {
                return false;
            }
            model.remove(at);
            true
        }
        ListOp::ReplaceAt(at, v) => match model.get_mut(at) {
            Some(slot) => {
                *slot = v;
                true
            }
            None => false,
        },
        ListOp::RetainEven => {
            let before = model.len();
            model.retain(|v| v % 2 == 0);
            model.len() < before
        }
        ListOp::Truncate(len) => {
            let before = model.len();
            model.truncate(len);
            model.len() < before
        }
        ListOp::Clear => {
            model.clear();
            true
        }
    }
}

fn apply_to_box(list: &ListBox<i16>, op: &ListOp) {
    match *op {
        ListOp::Push(v) => list.push(v).unwrap(),
        ListOp::Pop => {
            list.pop().unwrap();
        }
        ListOp::Insert(at, v) => {
            list.insert(at, v).unwrap();
        }
        ListOp::Remove(at) => {
            list.remove(at).unwrap();
        }
        ListOp::ReplaceAt(at, v) => {
            list.replace_at(at, v).unwrap();
        }
        ListOp::RetainEven => {
            list.retain(|v| v % 2 == 0).unwrap();
        }
        ListOp::Truncate(len) => {
            list.truncate(len).unwrap();
        }
        ListOp::Clear => list.clear().unwrap(),
    }
}

proptest! {
    #[test]
    fn list_box_tracks_vec_model(ops in prop::collection::vec(list_op(), 0..40)) {
        let boxes = Boxes::new();
        let list: ListBox<i16> = ListBox::named(&boxes, Scope::new("props::Lists"), "model");
        let changes = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&changes);
        list.add_change_observer(change_observer(move |_, _, _, _| {
            *counter.lock().unwrap() += 1;
            Ok(())
        }))
        .unwrap();

        let mut model = Vec::new();
        let mut expected_changes = 0usize;
        for op in &ops {
            if apply_to_model(&mut model, op) {
                expected_changes += 1;
            }
            apply_to_box(&list, op);
            prop_assert_eq!(list.to_vec(), model.clone());
        }
        prop_assert_eq!(*changes.lock().unwrap(), expected_changes);
    }

    #[test]
    fn sub_list_is_always_a_slice_of_its_list(
        items in prop::collection::vec(any::<i16>(), 0..20),
        start in 0usize..25,
        len in 0usize..25,
        pushes in prop::collection::vec(any::<i16>(), 0..5),
    ) {
        let boxes = Boxes::new();
        let list = ListBox::from_vec(&boxes, boxes.family(Scope::new("props::Lists"), "window"), items);
        let window = list.sub_list(start..start + len).unwrap();
        for v in pushes {
            window.push(v).unwrap();
            let all = list.to_vec();
            let seen = window.to_vec();
            let found = (0..=all.len().saturating_sub(seen.len()))
                .any(|at| all[at..at + seen.len()] == seen[..]);
            prop_assert!(found);
            prop_assert_eq!(seen.last(), Some(&v));
        }
    }
}
