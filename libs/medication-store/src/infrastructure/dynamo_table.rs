//! DynamoDB Table Engine Implementation
//!
//! This module implements the `TableEngine` trait using Amazon DynamoDB as the backend.
//! Conditions are pushed down as condition expressions so DynamoDB evaluates them
//! and applies the write atomically. All SDK errors are converted to `EngineError`.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValuesOnConditionCheckFailure};
use aws_sdk_dynamodb::Client;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::{Condition, EngineError, Item, TableEngine, ATTR_PK, ATTR_SK};
use crate::key::StorageKey;

/// Delay between two `DescribeTable` attempts while waiting for a table
const PING_INTERVAL: Duration = Duration::from_secs(1);

/// DynamoDB-based implementation of the TableEngine port
///
/// ## Table Schema
///
/// ```text
/// Primary Key:
///   - PK (String, Partition Key)
///   - SK (String, Sort Key)
/// ```
///
/// Every other attribute is stored as a String.
///
/// ## Error Handling
///
/// - `ConditionalCheckFailedException` becomes `EngineError::ConditionFailed`, carrying
///   the item that failed the check (`ReturnValuesOnConditionCheckFailure=ALL_OLD`)
/// - timeouts, dispatch failures, throttling and server errors become
///   `EngineError::Unavailable`
/// - everything else becomes `EngineError::Other`
#[derive(Clone)]
pub struct DynamoTable {
    client: Client,
}

impl std::fmt::Debug for DynamoTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoTable").finish_non_exhaustive()
    }
}

impl DynamoTable {
    /// Create a new DynamoDB engine from a configured client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create an engine from a shared SDK configuration
    ///
    /// When `endpoint` is set (DynamoDB Local, LocalStack) requests go there with
    /// static dummy credentials. Leave it empty when running against AWS.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use medication_store::DynamoTable;
    ///
    /// # async fn example() {
    /// let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    /// let engine = DynamoTable::from_sdk_config(&sdk_config, Some("http://localhost:8000".to_string()));
    /// # }
    /// ```
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, endpoint: Option<String>) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(endpoint) = endpoint {
            info!(endpoint = %endpoint, "Using DynamoDB endpoint override");
            builder = builder
                .endpoint_url(endpoint)
                .credentials_provider(Credentials::new("dummy", "dummy", None, None, "static"));
        }

        Self::new(Client::from_conf(builder.build()))
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Wait until `table` can be described, retrying once per second
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Unavailable` if the table is not reachable within `timeout`
    #[instrument(skip(self))]
    pub async fn ping(&self, table: &str, timeout: Duration) -> Result<(), EngineError> {
        let attempts = async {
            loop {
                match self.client.describe_table().table_name(table).send().await {
                    Ok(_) => return,
                    Err(err) => {
                        error!(table, error = %DisplayErrorContext(&err), "Describe table failed");
                        tokio::time::sleep(PING_INTERVAL).await;
                    }
                }
            }
        };

        tokio::time::timeout(timeout, attempts).await.map_err(|_| {
            EngineError::unavailable(format!(
                "table '{}' not reachable within {}ms",
                table,
                timeout.as_millis()
            ))
        })?;

        info!(table, "DynamoDB table is reachable");
        Ok(())
    }
}

impl TableEngine for DynamoTable {
    fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Condition,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        let client = self.client.clone();
        let table = table.to_string();

        async move {
            let mut request = client
                .put_item()
                .table_name(&table)
                .set_item(Some(to_attribute_map(item)))
                .return_values_on_condition_check_failure(
                    ReturnValuesOnConditionCheckFailure::AllOld,
                );

            if let Some(expr) = ConditionExpression::render(&condition) {
                debug!(table = %table, condition = %expr.expression, "Conditional PutItem");
                let ConditionExpression {
                    expression,
                    names,
                    values,
                } = expr;
                request = request
                    .condition_expression(expression)
                    .set_expression_attribute_names(Some(names))
                    .set_expression_attribute_values(non_empty(values));
            }

            request.send().await.map(|_| ()).map_err(put_error)
        }
    }

    fn get_item(
        &self,
        table: &str,
        key: &StorageKey,
    ) -> impl Future<Output = Result<Option<Item>, EngineError>> + Send {
        let client = self.client.clone();
        let table = table.to_string();
        let key = key.clone();

        async move {
            let output = client
                .get_item()
                .table_name(&table)
                .key(ATTR_PK, AttributeValue::S(key.partition().to_string()))
                .key(ATTR_SK, AttributeValue::S(key.sort().to_string()))
                .consistent_read(true)
                .send()
                .await
                .map_err(get_error)?;

            output.item().map(from_attribute_map).transpose()
        }
    }

    fn delete_item(
        &self,
        table: &str,
        key: &StorageKey,
        condition: Condition,
    ) -> impl Future<Output = Result<(), EngineError>> + Send {
        let client = self.client.clone();
        let table = table.to_string();
        let key = key.clone();

        async move {
            let mut request = client
                .delete_item()
                .table_name(&table)
                .key(ATTR_PK, AttributeValue::S(key.partition().to_string()))
                .key(ATTR_SK, AttributeValue::S(key.sort().to_string()))
                .return_values_on_condition_check_failure(
                    ReturnValuesOnConditionCheckFailure::AllOld,
                );

            if let Some(expr) = ConditionExpression::render(&condition) {
                debug!(table = %table, condition = %expr.expression, "Conditional DeleteItem");
                let ConditionExpression {
                    expression,
                    names,
                    values,
                } = expr;
                request = request
                    .condition_expression(expression)
                    .set_expression_attribute_names(Some(names))
                    .set_expression_attribute_values(non_empty(values));
            }

            request.send().await.map(|_| ()).map_err(delete_error)
        }
    }
}

/// A condition rendered as a DynamoDB condition expression
///
/// Attribute names and values always go through placeholders (`#n0`, `:v0`, ...) so
/// reserved words and arbitrary values are safe.
#[derive(Debug, Default, PartialEq)]
pub struct ConditionExpression {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl ConditionExpression {
    /// Render `condition`, or `None` if it places no constraint on the write
    pub fn render(condition: &Condition) -> Option<Self> {
        let mut rendered = Self::default();
        rendered.expression = rendered.push(condition)?;
        Some(rendered)
    }

    fn push(&mut self, condition: &Condition) -> Option<String> {
        match condition {
            Condition::ItemAbsent => {
                let pk = self.name(ATTR_PK);
                let sk = self.name(ATTR_SK);
                Some(format!(
                    "attribute_not_exists({}) AND attribute_not_exists({})",
                    pk, sk
                ))
            }
            Condition::Equals { attribute, value } => {
                let name = self.name(attribute);
                let value = self.value(value);
                Some(format!("{} = {}", name, value))
            }
            Condition::AttributeAbsent { attribute } => {
                let name = self.name(attribute);
                Some(format!("attribute_not_exists({})", name))
            }
            Condition::All(conditions) => {
                let mut parts: Vec<String> = conditions.iter().filter_map(|c| self.push(c)).collect();
                match parts.len() {
                    0 => None,
                    1 => parts.pop(),
                    _ => Some(
                        parts
                            .iter()
                            .map(|part| format!("({})", part))
                            .collect::<Vec<_>>()
                            .join(" AND "),
                    ),
                }
            }
        }
    }

    fn name(&mut self, attribute: &str) -> String {
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    fn value(&mut self, value: &str) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values
            .insert(placeholder.clone(), AttributeValue::S(value.to_string()));
        placeholder
    }
}

/// DynamoDB rejects an empty value map, so it is omitted when unused
fn non_empty(values: HashMap<String, AttributeValue>) -> Option<HashMap<String, AttributeValue>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn to_attribute_map(item: Item) -> HashMap<String, AttributeValue> {
    item.into_iter()
        .map(|(name, value)| (name, AttributeValue::S(value)))
        .collect()
}

fn from_attribute_map(map: &HashMap<String, AttributeValue>) -> Result<Item, EngineError> {
    map.iter()
        .map(|(name, value)| match value.as_s() {
            Ok(s) => Ok((name.clone(), s.clone())),
            Err(_) => Err(EngineError::other(format!(
                "attribute '{}' is not a string",
                name
            ))),
        })
        .collect()
}

/// A failed check stays a `ConditionFailed` whatever the returned item holds
///
/// Non-string attributes are never written by this engine; they are logged and
/// dropped so the conflict keeps its kind.
fn condition_failed(item: Option<&HashMap<String, AttributeValue>>) -> EngineError {
    let current = item.map(|map| {
        map.iter()
            .filter_map(|(name, value)| match value.as_s() {
                Ok(s) => Some((name.clone(), s.clone())),
                Err(_) => {
                    warn!(attribute = %name, "Dropping non-string attribute of conflicting item");
                    None
                }
            })
            .collect::<Item>()
    });

    EngineError::ConditionFailed { current }
}

fn is_transport_failure<E, R>(err: &SdkError<E, R>) -> bool {
    matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
    )
}

fn put_error(err: SdkError<PutItemError>) -> EngineError {
    let message = format!("DynamoDB PutItem failed: {}", DisplayErrorContext(&err));
    if is_transport_failure(&err) {
        warn!(error = %message, "Transient DynamoDB failure");
        return EngineError::unavailable(message);
    }

    match err.as_service_error() {
        Some(PutItemError::ConditionalCheckFailedException(failed)) => condition_failed(failed.item()),
        Some(
            PutItemError::ProvisionedThroughputExceededException(_)
            | PutItemError::RequestLimitExceeded(_)
            | PutItemError::InternalServerError(_),
        ) => EngineError::unavailable(message),
        _ => EngineError::other(message),
    }
}

fn get_error(err: SdkError<GetItemError>) -> EngineError {
    let message = format!("DynamoDB GetItem failed: {}", DisplayErrorContext(&err));
    if is_transport_failure(&err) {
        warn!(error = %message, "Transient DynamoDB failure");
        return EngineError::unavailable(message);
    }

    match err.as_service_error() {
        Some(
            GetItemError::ProvisionedThroughputExceededException(_)
            | GetItemError::RequestLimitExceeded(_)
            | GetItemError::InternalServerError(_),
        ) => EngineError::unavailable(message),
        _ => EngineError::other(message),
    }
}

fn delete_error(err: SdkError<DeleteItemError>) -> EngineError {
    let message = format!("DynamoDB DeleteItem failed: {}", DisplayErrorContext(&err));
    if is_transport_failure(&err) {
        warn!(error = %message, "Transient DynamoDB failure");
        return EngineError::unavailable(message);
    }

    match err.as_service_error() {
        Some(DeleteItemError::ConditionalCheckFailedException(failed)) => {
            condition_failed(failed.item())
        }
        Some(
            DeleteItemError::ProvisionedThroughputExceededException(_)
            | DeleteItemError::RequestLimitExceeded(_)
            | DeleteItemError::InternalServerError(_),
        ) => EngineError::unavailable(message),
        _ => EngineError::other(message),
    }
}
