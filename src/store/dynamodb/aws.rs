//! `AwsDynamoClient` - DynamoDB over `aws-sdk-dynamodb`
//!
//! TigerStyle: SDK errors keep their service code.
//!
//! The SDK is natively awaitable, so [`PromiseDynamoClient`] is the primary
//! surface. The callback surface spawns the awaitable call on the current
//! tokio runtime and reports through the completion function.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ReturnValue, ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;

use super::client::{Callback, DynamoClient, PromiseDynamoClient};
use super::types::{
    ClientError, DeleteItemInput, DeleteItemOutput, GetItemInput, GetItemOutput, ItemsOutput,
    PutItemInput, PutItemOutput, QueryInput, ScanInput, TableSchema,
};

const HASH_NAME: &str = "#hash";
const HASH_VALUE: &str = ":hash";

/// Where and how to reach DynamoDB. Unset fields come from the standard AWS
/// environment (profile, `AWS_REGION`, credentials chain).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsClientOptions {
    /// Region override
    pub region: Option<String>,
    /// Endpoint override, e.g. a local DynamoDB
    pub endpoint_url: Option<String>,
}

/// DynamoDB client backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct AwsDynamoClient {
    client: Client,
    promise: bool,
}

impl AwsDynamoClient {
    /// Wrap an SDK client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            promise: true,
        }
    }

    /// Build an SDK client from the AWS environment plus `options`.
    pub async fn connect(options: &AwsClientOptions) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint_url) = &options.endpoint_url {
            loader = loader.endpoint_url(endpoint_url.clone());
        }
        let sdk_config = loader.load().await;
        tracing::info!(
            region = ?sdk_config.region(),
            endpoint = ?options.endpoint_url,
            "dynamodb sdk client configured"
        );
        Self::new(Client::new(&sdk_config))
    }

    /// Drop the awaitable flavor; only callback calls remain.
    #[must_use]
    pub fn callback_only(mut self) -> Self {
        self.promise = false;
        self
    }

    /// Create a pay-per-request table for `schema`. A table that already
    /// exists is left as it is.
    ///
    /// # Errors
    /// Any other SDK failure.
    pub async fn ensure_table(&self, schema: &TableSchema) -> Result<(), ClientError> {
        let mut request = self
            .client
            .create_table()
            .table_name(&schema.table_name)
            .billing_mode(BillingMode::PayPerRequest);

        let keys = std::iter::once((&schema.hash_key, KeyType::Hash))
            .chain(schema.range_key.iter().map(|range| (range, KeyType::Range)));
        for (name, key_type) in keys {
            let element = KeySchemaElement::builder()
                .attribute_name(name)
                .key_type(key_type)
                .build()
                .map_err(|e| ClientError::new("ValidationException", e.to_string()))?;
            let definition = AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(|e| ClientError::new("ValidationException", e.to_string()))?;
            request = request.key_schema(element).attribute_definitions(definition);
        }

        match request.send().await {
            Ok(_) => {
                tracing::info!(table = %schema.table_name, "created dynamodb table");
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_in_use_exception()) =>
            {
                tracing::debug!(table = %schema.table_name, "dynamodb table exists");
                Ok(())
            }
            Err(err) => Err(client_error(err)),
        }
    }

    fn spawn<T, F>(&self, call: F, done: Callback<T>)
    where
        T: Send + 'static,
        F: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { done(call.await) });
            }
            Err(e) => done(Err(ClientError::new(
                "RuntimeUnavailable",
                format!("no tokio runtime for the callback call: {e}"),
            ))),
        }
    }
}

fn client_error<E, R>(err: SdkError<E, R>) -> ClientError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug + 'static,
{
    let code = err.code().unwrap_or("SdkError").to_string();
    ClientError::new(code, DisplayErrorContext(&err).to_string())
}

fn sdk_limit(limit: Option<usize>) -> Option<i32> {
    limit.map(|limit| i32::try_from(limit).unwrap_or(i32::MAX))
}

#[async_trait]
impl PromiseDynamoClient for AwsDynamoClient {
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, ClientError> {
        self.client
            .put_item()
            .table_name(input.table_name)
            .set_item(Some(input.item))
            .send()
            .await
            .map_err(client_error)?;
        Ok(PutItemOutput {})
    }

    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, ClientError> {
        let output = self
            .client
            .get_item()
            .table_name(input.table_name)
            .set_key(Some(input.key))
            .send()
            .await
            .map_err(client_error)?;
        Ok(GetItemOutput { item: output.item })
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, ClientError> {
        let output = self
            .client
            .delete_item()
            .table_name(input.table_name)
            .set_key(Some(input.key))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(client_error)?;
        Ok(DeleteItemOutput {
            attributes: output.attributes,
        })
    }

    async fn query(&self, input: QueryInput) -> Result<ItemsOutput, ClientError> {
        let output = self
            .client
            .query()
            .table_name(input.table_name)
            .key_condition_expression(format!("{HASH_NAME} = {HASH_VALUE}"))
            .expression_attribute_names(HASH_NAME, input.hash_key)
            .expression_attribute_values(HASH_VALUE, input.hash_value)
            .set_limit(sdk_limit(input.limit))
            .send()
            .await
            .map_err(client_error)?;
        Ok(ItemsOutput {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key,
        })
    }

    async fn scan(&self, input: ScanInput) -> Result<ItemsOutput, ClientError> {
        let output = self
            .client
            .scan()
            .table_name(input.table_name)
            .set_limit(sdk_limit(input.limit))
            .send()
            .await
            .map_err(client_error)?;
        Ok(ItemsOutput {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key,
        })
    }
}

impl DynamoClient for AwsDynamoClient {
    fn put_item(&self, input: PutItemInput, done: Callback<PutItemOutput>) {
        let client = self.clone();
        self.spawn(async move { PromiseDynamoClient::put_item(&client, input).await }, done);
    }

    fn get_item(&self, input: GetItemInput, done: Callback<GetItemOutput>) {
        let client = self.clone();
        self.spawn(async move { PromiseDynamoClient::get_item(&client, input).await }, done);
    }

    fn delete_item(&self, input: DeleteItemInput, done: Callback<DeleteItemOutput>) {
        let client = self.clone();
        self.spawn(async move { PromiseDynamoClient::delete_item(&client, input).await }, done);
    }

    fn query(&self, input: QueryInput, done: Callback<ItemsOutput>) {
        let client = self.clone();
        self.spawn(async move { PromiseDynamoClient::query(&client, input).await }, done);
    }

    fn scan(&self, input: ScanInput, done: Callback<ItemsOutput>) {
        let client = self.clone();
        self.spawn(async move { PromiseDynamoClient::scan(&client, input).await }, done);
    }

    fn promise_api(&self) -> Option<Arc<dyn PromiseDynamoClient>> {
        if self.promise {
            Some(Arc::new(self.clone()))
        } else {
            None
        }
    }
}
