#![forbid(unsafe_code)]

//! Notification paths between wrapper boxes, their windows and views
//! computed from them.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread;

use powerbox_collections::{ListBox, MapBox, SetBox};
use powerbox_core::{Boxes, Scope, Tracked, ValueBox, WrapperBox, change_observer};

const SCOPE: Scope = Scope::new("e2e::Inventory");

fn record<W: WrapperBox>(target: &W, log: &Arc<Mutex<Vec<String>>>, label: &'static str) {
    let log = Arc::clone(log);
    target
        .add_change_observer(change_observer(move |subject, _, _, _| {
            assert!(subject.is_self_valued());
            log.lock().unwrap().push(label.to_owned());
            Ok(())
        }))
        .unwrap();
}

#[test]
fn window_changes_reach_views_of_the_list() {
    let boxes = Boxes::new();
    let stock: ListBox<u32> = ListBox::from_vec(&boxes, boxes.family(SCOPE, "stock"), vec![1, 2, 3]);
    let source = stock.clone();
    let count = boxes.view(SCOPE, "count", move || Ok(source.len()));
    count.depends_on(&stock).unwrap();

    assert_eq!(count.get().unwrap(), 3);
    let window = stock.sub_list(0..2).unwrap();
    window.remove(0).unwrap();
    assert!(!count.is_valid());
    assert_eq!(count.get().unwrap(), 2);
}

#[test]
fn cursor_edit_notifies_cursor_and_list() {
    let boxes = Boxes::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let stock: ListBox<u32> = ListBox::from_vec(&boxes, boxes.family(SCOPE, "ordered"), vec![5, 6]);
    record(&stock, &log, "list");
    let mut cursor = stock.cursor().unwrap();
    record(&cursor, &log, "cursor");

    assert_eq!(cursor.next(), Some(5));
    cursor.set(50).unwrap();
    let mut seen = log.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["cursor", "list"]);
    assert_eq!(stock, vec![50, 6]);
}

#[test]
fn wrappers_equal_plain_collections() {
    let boxes = Boxes::new();
    let tags = SetBox::from_iter_in(&boxes, boxes.family(SCOPE, "tags"), ["red", "blue"]);
    let plain: HashSet<&str> = ["blue", "red"].into_iter().collect();
    assert_eq!(tags, plain);

    let counts = MapBox::from_iter_in(&boxes, boxes.family(SCOPE, "counts"), [("bolt", 4_u32)]);
    let plain: HashMap<&str, u32> = [("bolt", 4)].into_iter().collect();
    assert_eq!(counts, plain);

    let same = ValueBox::get(&counts).unwrap();
    assert_eq!(same.box_id(), counts.box_id());
}

#[test]
fn concurrent_pushes_are_all_observed() {
    let boxes = Boxes::new();
    let list: ListBox<usize> = ListBox::named(&boxes, SCOPE, "shared");
    let changes = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&changes);
    list.add_change_observer(change_observer(move |_, _, _, _| {
        *counter.lock().unwrap() += 1;
        Ok(())
    }))
    .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let list = list.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    list.push(worker * 100 + i).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(list.len(), 100);
    assert_eq!(*changes.lock().unwrap(), 100);
}
