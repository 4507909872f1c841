//! Service Bus management plane: ARM discovery and entity CRUD, queue
//! statistics with a TTL cache, and namespace SAS token generation.

pub mod management;
pub mod models;
pub mod sas;
pub mod statistics;

pub use management::{NamespaceScope, ServiceBusManagementClient};
pub use models::{
    AccessKeys, EntityStatus, MessageCountDetails, NamespaceProperties, QueueDescription,
    QueueProperties, ResourceGroup, ServiceBusNamespace, Subscription, SubscriptionDescription,
    SubscriptionProperties, TopicDescription, TopicProperties,
};
pub use sas::SasTokenGenerator;
pub use statistics::{QueueStatisticsService, QueueStatsCache, QueueType, StatisticsConfig};
