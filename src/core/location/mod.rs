pub mod location_registry;
