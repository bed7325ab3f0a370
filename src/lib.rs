//! Datagate: configuration-driven JSON query gateway over relational and search-engine datasources.

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod datasource;
pub mod dialect;
pub mod error;
pub mod gateway;
pub mod introspect;
pub mod registry;
pub mod request;
pub mod session;

pub use bootstrap::{Bootstrap, SUPPLIED_DATASOURCE_NAME};
pub use config::{
    deep_merge, load_config, AssociationConfig, AssociationKind, ColumnConfig, DbTableConfig, GatewayConfig,
    TableConfig,
};
pub use context::current_database;
pub use datasource::{connect_datasource, Binding, DatasourceHandle, SearchClient};
pub use dialect::Dialect;
pub use error::{AppError, ConfigError, ErrorBody, ErrorKind};
pub use gateway::Gateway;
pub use introspect::{reconcile, InformationSchemaIntrospector, SchemaIntrospector, SchemaRow};
pub use registry::{ConfigRegistry, RegistryBuilder};
pub use request::{parse_target, OperationKind, Request, Target, Template};
pub use session::{DispatchContext, LoggingSession, Session};
