pub mod agent;
pub mod config;
pub mod interp;
pub mod mutation;
pub mod program;
pub mod sprite;
pub mod stats;
pub mod view;
pub mod world;
