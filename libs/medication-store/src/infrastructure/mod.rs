//! Infrastructure adapters implementing the engine port

mod dynamo_table;

pub use dynamo_table::{ConditionExpression, DynamoTable};
