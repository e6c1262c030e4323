#![forbid(unsafe_code)]

//! End-to-end scenarios through the facade: boxes, views and collections
//! wired together the way an application would.

use std::sync::{Arc, Mutex};

use powerbox::collections::SubList;
use powerbox::prelude::*;
use tracing_test::traced_test;

const PANEL: Scope = Scope::new("app::Panel");
const CART: Scope = Scope::new("app::Cart");

/// A box kept by someone else, adopted into a family with `upgrade`.
#[derive(Default)]
struct Legacy {
    value: Mutex<String>,
}

impl ValueBox<String> for Legacy {
    fn get(&self) -> Result<String, BoxError> {
        Ok(self.value.lock().unwrap().clone())
    }

    fn set(&self, value: String) -> Result<(), BoxError> {
        *self.value.lock().unwrap() = value;
        Ok(())
    }
}

#[traced_test]
#[test]
fn clamped_setting_logs_requested_value() {
    let boxes = Boxes::new();
    let volume = boxes.cell(PANEL, "volume", 0_u8);
    volume
        .add_change_middleware(Arc::new(EnsureBounds::between(0_u8, 100).unwrap()))
        .unwrap()
        .add_change_observer(Arc::new(ChangeLogger))
        .unwrap();

    volume.set(150).unwrap();
    assert_eq!(volume.get().unwrap(), 100);
    assert!(logs_contain(
        "Panel.volume value changed from 0 to 100 (requested value was 150)"
    ));
}

#[test]
fn cart_total_follows_list_and_window_edits() {
    let boxes = Boxes::new();
    let prices: ListBox<u32> = ListBox::named(&boxes, CART, "prices");
    let source = prices.clone();
    let total = boxes.view(CART, "total", move || Ok(source.iter().sum::<u32>()));
    total.depends_on(&prices).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    total
        .add_change_observer(change_observer(move |_, _, final_value: &u32, _| {
            log.lock().unwrap().push(*final_value);
            Ok(())
        }))
        .unwrap();

    prices.push(10).unwrap();
    prices.extend([5, 7]).unwrap();
    let tail: SubList<u32> = prices.sub_list(1..3).unwrap();
    tail.clear().unwrap();
    assert_eq!(prices, vec![10]);
    assert_eq!(total.get().unwrap(), 10);
    assert_eq!(*seen.lock().unwrap(), vec![10, 22, 10]);
}

#[test]
fn rejected_write_leaves_value_and_reports_family() {
    let boxes = Boxes::new();
    let retries = boxes.cell(PANEL, "retries", 3_i32);
    retries
        .add_change_observer(Arc::new(RequireBounds::between(0, 10).unwrap()))
        .unwrap();

    let err = retries.set(15).unwrap_err();
    assert!(!err.is_fatal());
    let message = err.to_string();
    assert!(message.starts_with("error in ChangeObserver 1 out of 1 of Panel.retries"));
    assert!(message.contains("requested value = 15"));
    assert_eq!(retries.get().unwrap(), 3);
}

#[test]
fn hidden_values_stay_out_of_errors() {
    let boxes = Boxes::with_config(BoxesConfig::new().with_hidden_values());
    let pin = boxes.cell(PANEL, "pin", 1234_u32);
    pin.add_change_observer(Arc::new(RequireBounds::between(0_u32, 9999).unwrap()))
        .unwrap();

    let message = pin.set(123_456).unwrap_err().to_string();
    assert!(message.ends_with("values hidden"));
    assert!(!message.contains("123456"));
    assert_eq!(pin.to_string(), "[hidden value of Panel.pin]");
}

#[test]
fn boxes_map_writes_through_upgraded_boxes() {
    let boxes = Boxes::new();
    let legacy = Arc::new(Legacy::default());
    let title = boxes.upgrade(PANEL, "title", Arc::clone(&legacy));
    title
        .add_change_middleware(change_middleware(|_, _, current: &String, _| {
            Ok(current.trim().to_owned())
        }))
        .unwrap();

    let mut fields = BoxesMap::new(&boxes, PANEL, "field");
    fields.put_box("title", Arc::new(title));
    fields.put("title", "  Inbox  ".to_owned()).unwrap();
    assert_eq!(legacy.get().unwrap(), "Inbox");
    assert_eq!(fields.get(&"title").unwrap().as_deref(), Some("Inbox"));
    assert!(fields.put("footer", String::new()).is_err());
}
