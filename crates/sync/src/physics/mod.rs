mod body;
mod rapier_body;
mod world;

pub use body::{PhysicalBody, TransformBody};
pub use rapier_body::RapierBody;
pub use world::PhysicsWorld;
