#![forbid(unsafe_code)]

//! Composite-value wrapper boxes.
//!
//! [`ListBox`], [`SetBox`] and [`MapBox`] are boxes that *are* a list, a set
//! or a map. Each mutating method changes the value in place and then runs
//! the box family's change observers. Windows onto them ([`SubList`],
//! [`ListCursor`], [`KeySet`], [`Entries`]) are wrapper boxes of their own
//! whose changes are also changes of the box they view.
//!
//! [`BoxesMap`] is different: a map whose values live in separate boxes, so
//! that writing through the map goes through each box's pipelines.

/// Handle plumbing shared by every wrapper type here: `Clone`, identity,
/// family access, the [`WrapperBox`](powerbox_core::WrapperBox) impl and
/// string forms. The type must be a struct with a single `cell` field.
macro_rules! wrapper_plumbing {
    ($name:ident<$($param:ident),+>, raw = $raw:ty, where $($bounds:tt)+) => {
        impl<$($param),+> Clone for $name<$($param),+> {
            fn clone(&self) -> Self {
                Self {
                    cell: std::sync::Arc::clone(&self.cell),
                }
            }
        }

        impl<$($param),+> powerbox_core::Tracked for $name<$($param),+>
        where
            $($bounds)+
        {
            fn box_id(&self) -> powerbox_core::BoxId {
                self.cell.id()
            }

            fn liveness(&self) -> std::sync::Weak<dyn std::any::Any + Send + Sync> {
                let weak: std::sync::Weak<powerbox_core::WrapperCell<$raw, Self>> =
                    std::sync::Arc::downgrade(&self.cell);
                weak
            }
        }

        impl<$($param),+> powerbox_core::ChangeSource<Self> for $name<$($param),+>
        where
            $($bounds)+
        {
            fn family(&self) -> &std::sync::Arc<powerbox_core::Family<Self>> {
                self.cell.family()
            }
        }

        impl<$($param),+> powerbox_core::WrapperBox for $name<$($param),+>
        where
            $($bounds)+
        {
            type Raw = $raw;

            fn cell(&self) -> &powerbox_core::WrapperCell<$raw, Self> {
                &self.cell
            }
        }

        impl<$($param),+> std::fmt::Debug for $name<$($param),+>
        where
            $($bounds)+
        {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.cell.revealed_string())
            }
        }

        impl<$($param),+> std::fmt::Display for $name<$($param),+>
        where
            $($bounds)+
        {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&powerbox_core::WrapperBox::render(self))
            }
        }
    };
}

use std::hash::{BuildHasher, Hash};

/// Hash of an unordered collection: the wrapping sum of the element hashes
/// under fixed seeds, so equal sets and maps hash alike whatever their
/// iteration order.
pub(crate) fn unordered_hash<T: Hash>(items: impl IntoIterator<Item = T>) -> u64 {
    let hasher = ahash::RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    );
    items
        .into_iter()
        .fold(0_u64, |sum, item| sum.wrapping_add(hasher.hash_one(item)))
}

mod boxes_map;
mod list;
mod map;
mod set;

pub use boxes_map::{BoxesMap, BoxesMapError};
pub use list::{ListBox, ListCursor, SubList};
pub use map::{Entries, KeySet, MapBox};
pub use set::SetBox;
