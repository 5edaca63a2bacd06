// Domain layer: data contract shared by the stages and the ports to external systems.

pub mod model;
pub mod ports;
