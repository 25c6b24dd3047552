use crate::EntityId;

/// Abstract component type: a plain data record attached to an entity.
///
/// Components are stored in separated dense arrays for maximum cache
/// efficiency, one [`ComponentStore`](crate::ComponentStore) per type.
/// `Default` is required because a store's free slots hold default-valued
/// payloads and because creating a component without an initial value fixes
/// the default.
///
/// Both lifecycle hooks have empty default bodies. They run synchronously
/// inside fixation and release, and a panic inside either is caught and
/// logged without aborting the operation. Hooks must not mutate the store
/// they are being called from.
///
/// ## Examples
///
/// ```
/// use sparsecs::Component;
///
/// #[derive(Default)]
/// pub struct Position {
///     pub x: f32,
///     pub y: f32,
/// }
///
/// impl Component for Position {}
/// ```
///
/// ```
/// use sparsecs::{Component, EntityId};
///
/// #[derive(Default)]
/// pub struct Spawned {
///     pub by: EntityId,
/// }
///
/// impl Component for Spawned {
///     fn on_create(&mut self, entity: EntityId) {
///         self.by = entity;
///     }
/// }
/// ```
pub trait Component: Default + 'static {
    /// Called once when this component is fixed into a slot.
    fn on_create(&mut self, _entity: EntityId) {}

    /// Called once when this component's slot is released.
    fn on_destroy(&mut self, _entity: EntityId) {}
}
