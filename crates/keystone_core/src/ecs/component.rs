//! # Component System
//!
//! Components are plain data records with no behavior. The core treats them
//! as opaque payloads: any `Send + 'static` type can be registered.

use std::any::{type_name, TypeId};

/// Marker trait for ECS components.
///
/// Implemented for every `Send + 'static` type. Components are moved into
/// their array on insert and moved back out on remove, so they do not need
/// to be `Copy` or `Default`.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// struct Position {
///     x: f32,
///     y: f32,
///     z: f32,
/// }
///
/// coordinator.register_component::<Position>()?;
/// ```
pub trait Component: Send + 'static {}

impl<T: Send + 'static> Component for T {}

/// A set of component types used to build a query signature.
///
/// Implemented for tuples of one to eight components:
///
/// ```rust,ignore
/// let movers = coordinator.entities_with::<(Position, Velocity)>()?;
/// ```
pub trait ComponentSet: 'static {
    /// Calls `visit` once per member type with its id and name.
    fn visit_types(visit: &mut dyn FnMut(TypeId, &'static str));
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn visit_types(visit: &mut dyn FnMut(TypeId, &'static str)) {
                $( visit(TypeId::of::<$name>(), type_name::<$name>()); )+
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);
