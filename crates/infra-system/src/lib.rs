// Overseer Infrastructure - System Adapters
// Implements: SystemInfo

pub mod system_info_impl;

pub use system_info_impl::SystemInfoImpl;
