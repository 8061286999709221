use anyhow::{Context, Result};
use async_trait::async_trait;
use gcloud_gax::grpc::Code;
use gcloud_googleapis::spanner::admin::database::v1::{
    CreateDatabaseRequest, GetDatabaseDdlRequest, GetDatabaseRequest, UpdateDatabaseDdlRequest,
};
use gcloud_googleapis::spanner::admin::instance::v1::{
    CreateInstanceRequest, GetInstanceRequest, Instance,
};
use gcloud_spanner::admin::client::Client as AdminClient;
use gcloud_spanner::admin::AdminClientConfig;
use gcloud_spanner::client::{Client, ClientConfig, Error as ClientError};
use gcloud_spanner::key::Key;
use gcloud_spanner::mutation::{delete, insert};
use gcloud_spanner::statement::Statement;

use crate::config::SpannerConfig;
use crate::models::Record;
use crate::store::{CreateOutcome, RecordStore};

const TABLE: &str = "records";

/// Spanner-backed record store
pub struct SpannerRecordStore {
    inner: Client,
}

impl SpannerRecordStore {
    /// Create a new Spanner client from configuration
    ///
    /// The gcloud-spanner library automatically detects the
    /// SPANNER_EMULATOR_HOST environment variable and connects to
    /// the emulator when set, or production Spanner otherwise.
    ///
    /// The instance, database, and `records` table are created first if
    /// they don't exist.
    pub async fn from_config(config: &SpannerConfig) -> Result<Self> {
        auto_provision(config).await?;

        let database_path = config.database_path();

        match &config.emulator_host {
            Some(host) => tracing::info!("Connecting to Spanner emulator at: {}", host),
            None => tracing::info!("Connecting to production Spanner"),
        }

        // ClientConfig::default() automatically uses SPANNER_EMULATOR_HOST if set
        let client = Client::new(&database_path, ClientConfig::default())
            .await
            .context("Failed to create Spanner client")?;

        tracing::info!(
            "Successfully connected to Spanner database: {}",
            database_path
        );

        Ok(Self {
            inner: client,
        })
    }
}

#[async_trait]
impl RecordStore for SpannerRecordStore {
    /// Insert a new row; Spanner rejects the mutation with ALREADY_EXISTS
    /// when the key is taken.
    async fn create(&self, record: &Record) -> Result<CreateOutcome> {
        let mutation = insert(TABLE, &["id", "content"], &[&record.id, &record.content]);

        match self.inner.apply(vec![mutation]).await {
            Ok(_) => {
                tracing::debug!("Inserted record with id: {}", record.id);
                Ok(CreateOutcome::Created)
            }
            Err(ClientError::GRPC(status)) if status.code() == Code::AlreadyExists => {
                tracing::debug!("Record already exists with id: {}", record.id);
                Ok(CreateOutcome::Conflict)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to insert record into Spanner")),
        }
    }

    async fn fetch(&self, id: &str) -> Result<Option<Record>> {
        let mut statement = Statement::new(
            "SELECT id, content FROM records WHERE id = @id"
        );
        statement.add_param("id", &id.to_string());

        let mut tx = self.inner
            .single()
            .await
            .context("Failed to create read transaction")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to query record from Spanner")?;

        if let Some(row) = result_set.next().await? {
            let id: String = row.column_by_name("id")?;
            let content: String = row.column_by_name("content")?;

            tracing::debug!("Read record with id: {}", id);
            Ok(Some(Record { id, content }))
        } else {
            tracing::debug!("Record not found with id: {}", id);
            Ok(None)
        }
    }

    /// Deleting a missing key is not an error in Spanner
    async fn delete(&self, id: &str) -> Result<()> {
        let mutation = delete(TABLE, Key::new(&id.to_string()));

        self.inner
            .apply(vec![mutation])
            .await
            .context("Failed to delete record from Spanner")?;

        tracing::debug!("Deleted record with id: {}", id);
        Ok(())
    }
}

/// Automatically provision Spanner instance, database, and table
///
/// Enables zero-setup local development with the emulator.
async fn auto_provision(config: &SpannerConfig) -> Result<()> {
    tracing::info!("Starting auto-provisioning checks...");

    let admin_client = AdminClient::new(AdminClientConfig::default())
        .await
        .context("Failed to create Spanner admin client")?;

    let project_path = format!("projects/{}", config.project);
    let instance_path = format!("{}/instances/{}", project_path, config.instance);
    let database_path = config.database_path();

    ensure_instance_exists(&admin_client, config, &project_path, &instance_path).await?;
    ensure_database_exists(&admin_client, &instance_path, &database_path).await?;
    ensure_table_exists(&admin_client, &database_path).await?;

    tracing::info!("Auto-provisioning complete");
    Ok(())
}

async fn ensure_instance_exists(
    admin_client: &AdminClient,
    config: &SpannerConfig,
    project_path: &str,
    instance_path: &str,
) -> Result<()> {
    let get_request = GetInstanceRequest {
        name: instance_path.to_string(),
        field_mask: None,
    };

    match admin_client.instance().get_instance(get_request, None).await {
        Ok(_) => {
            tracing::info!("Instance already exists: {}", instance_path);
            Ok(())
        }
        Err(status) if status.code() == Code::NotFound => {
            tracing::info!("Instance not found, creating: {}", instance_path);

            let instance_config = if config.emulator_host.is_some() {
                format!("{}/instanceConfigs/emulator-config", project_path)
            } else {
                format!("{}/instanceConfigs/regional-us-central1", project_path)
            };

            let create_request = CreateInstanceRequest {
                parent: project_path.to_string(),
                instance_id: config.instance.clone(),
                instance: Some(Instance {
                    name: instance_path.to_string(),
                    config: instance_config,
                    display_name: format!("{} instance", config.instance),
                    node_count: 1,
                    ..Default::default()
                }),
            };

            let mut operation = admin_client
                .instance()
                .create_instance(create_request, None)
                .await
                .context("Failed to start instance creation")?;

            operation
                .wait(None)
                .await
                .context("Failed to create instance")?;

            tracing::info!("Instance created successfully: {}", instance_path);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to check instance existence: {}",
            e.message()
        )),
    }
}

async fn ensure_database_exists(
    admin_client: &AdminClient,
    instance_path: &str,
    database_path: &str,
) -> Result<()> {
    let get_request = GetDatabaseRequest {
        name: database_path.to_string(),
    };

    match admin_client
        .database()
        .get_database(get_request, None)
        .await
    {
        Ok(_) => {
            tracing::info!("Database already exists: {}", database_path);
            Ok(())
        }
        Err(status) if status.code() == Code::NotFound => {
            tracing::info!("Database not found, creating: {}", database_path);

            let database_id = database_path
                .split('/')
                .next_back()
                .context("Invalid database path")?;

            let create_request = CreateDatabaseRequest {
                parent: instance_path.to_string(),
                create_statement: format!("CREATE DATABASE `{}`", database_id),
                extra_statements: vec![],
                encryption_config: None,
                database_dialect: 1, // Google Standard SQL
                proto_descriptors: vec![],
            };

            let mut operation = admin_client
                .database()
                .create_database(create_request, None)
                .await
                .context("Failed to start database creation")?;

            operation
                .wait(None)
                .await
                .context("Failed to create database")?;

            tracing::info!("Database created successfully: {}", database_path);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to check database existence: {}",
            e.message()
        )),
    }
}

fn is_records_table(statement: &str) -> bool {
    statement
        .trim_start()
        .strip_prefix("CREATE TABLE")
        .and_then(|rest| {
            rest.trim_start()
                .split(|c: char| c.is_whitespace() || c == '(')
                .next()
        })
        .is_some_and(|name| name.trim_matches('`') == TABLE)
}

async fn ensure_table_exists(admin_client: &AdminClient, database_path: &str) -> Result<()> {
    let get_ddl_request = GetDatabaseDdlRequest {
        database: database_path.to_string(),
    };

    let ddl_response = admin_client
        .database()
        .get_database_ddl(get_ddl_request, None)
        .await
        .context("Failed to get database DDL")?;

    let table_exists = ddl_response
        .into_inner()
        .statements
        .iter()
        .any(|stmt| is_records_table(stmt));

    if table_exists {
        tracing::info!("Table 'records' already exists");
        return Ok(());
    }

    tracing::info!("Table 'records' not found, creating...");

    let create_table_ddl = r#"
CREATE TABLE records (
    id STRING(MAX) NOT NULL,
    content STRING(MAX) NOT NULL,
) PRIMARY KEY (id)
"#
    .trim()
    .to_string();

    let update_request = UpdateDatabaseDdlRequest {
        database: database_path.to_string(),
        statements: vec![create_table_ddl],
        operation_id: String::new(),
        proto_descriptors: vec![],
        throughput_mode: false,
    };

    let mut operation = admin_client
        .database()
        .update_database_ddl(update_request, None)
        .await
        .context("Failed to start table creation")?;

    operation
        .wait(None)
        .await
        .context("Failed to create table")?;

    tracing::info!("Table 'records' created successfully");
    Ok(())
}
