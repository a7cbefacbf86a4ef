//! DingoDB YCSB Binding
//!
//! Lets a key/field-map workload generator drive a column table. Workers
//! share one storage client through a [`ClientPool`]; each operation goes
//! through the [`mapper`] to translate between field maps and positional
//! rows.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dingo_binding::{Binding, ClientPool};
//! use dingo_core::{BindingConfig, FieldMap};
//! use dingo_storage::EndpointConnector;
//!
//! let config = BindingConfig::new("mem://bench").with_field_count(3);
//! let pool = ClientPool::new(Arc::new(EndpointConnector), config);
//! let binding = Binding::init(&pool)?;
//! let admin = pool.acquire()?;
//! admin.client().create_table(&dingo_core::build_schema("usertable", 3)?)?;
//!
//! let mut fields = FieldMap::new();
//! fields.insert("field0".to_string(), "a".to_string());
//! binding.insert("usertable", "user1", &fields)?;
//! let record = binding.read("usertable", "user1", None)?;
//! # Ok::<(), dingo_core::BindingError>(())
//! ```

pub mod binding;
pub mod mapper;
pub mod pool;
pub mod registry;
pub mod telemetry;

pub use binding::{status_of, Binding};
pub use mapper::{overlay, to_positional, to_record};
pub use pool::{ClientHandle, ClientPool, Session};
pub use registry::SchemaRegistry;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
