#![forbid(unsafe_code)]

//! Reactive value boxes.
//!
//! A box holds one value and runs its family's participants on every read
//! and write. Views cache a value calculated from other boxes, and the
//! collection boxes notify on every in-place mutation.
//!
//! ```
//! use powerbox::prelude::*;
//!
//! let boxes = Boxes::new();
//! let width = boxes.cell(Scope::new("demo::Rect"), "width", 3_u32);
//! let height = boxes.cell(Scope::new("demo::Rect"), "height", 4_u32);
//!
//! let (w, h) = (width.clone(), height.clone());
//! let area = boxes.view(Scope::new("demo::Rect"), "area", move || Ok(w.get()? * h.get()?));
//! area.depends_on(&width).unwrap().depends_on(&height).unwrap();
//!
//! assert_eq!(area.get().unwrap(), 12);
//! width.set(5).unwrap();
//! assert_eq!(area.get().unwrap(), 20);
//! ```

pub use powerbox_core::*;

#[cfg(feature = "collections")]
pub use powerbox_collections as collections;

pub mod prelude {
    pub use powerbox_core::participants::{ChangeLogger, DefaultValue, EnsureBounds, RequireBounds};
    pub use powerbox_core::{
        BoxError, Boxes, BoxesConfig, Family, PowerBox, Scope, ValueBox, View, WrapperBox,
        change_middleware, change_observer, get_middleware, get_observer,
    };

    #[cfg(feature = "collections")]
    pub use powerbox_collections::{BoxesMap, ListBox, MapBox, SetBox};
}
