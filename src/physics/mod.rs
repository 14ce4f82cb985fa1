pub mod collision_event;
pub mod collision_system;
pub mod dynamic_aabb_tree;
pub mod impulse;
pub mod response_table;
pub mod sat;
