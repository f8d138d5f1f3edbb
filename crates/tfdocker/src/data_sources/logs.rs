//! docker_logs データソース

use crate::ProviderData;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tfdocker_engine::{LogRequest, read_logs};
use tfdocker_plugin::{
    Attribute, Block, DataSource, Diagnostics, Schema, Value, async_trait, decode, encode,
};

pub struct LogsDataSource;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct LogsDataModel {
    id: Option<String>,
    name: String,
    follow: Option<bool>,
    since: Option<String>,
    until: Option<String>,
    tail: Option<String>,
    timestamps: Option<bool>,
    show_stdout: Option<bool>,
    show_stderr: Option<bool>,
    discard_headers: Option<bool>,
    logs_raw: Option<String>,
}

impl LogsDataModel {
    fn request(&self) -> LogRequest {
        let defaults = LogRequest::default();
        LogRequest {
            container: self.name.clone(),
            since: self.since.clone(),
            until: self.until.clone(),
            tail: self
                .tail
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or(defaults.tail),
            timestamps: self.timestamps.unwrap_or(defaults.timestamps),
            show_stdout: self.show_stdout.unwrap_or(defaults.show_stdout),
            show_stderr: self.show_stderr.unwrap_or(defaults.show_stderr),
            follow: self.follow.unwrap_or(defaults.follow),
            discard_headers: self.discard_headers.unwrap_or(defaults.discard_headers),
        }
    }
}

fn schema() -> Schema {
    Schema::new(
        Block::new()
            .description("Reads the logs of a container.")
            .attribute(Attribute::computed_string("id").description("Identifier of this read."))
            .attribute(Attribute::required_string("name").description("Name or ID of the container."))
            .attribute(
                Attribute::optional_bool("follow")
                    .description("Follow the log stream until the container stops. Default is false."),
            )
            .attribute(
                Attribute::optional_string("since")
                    .description("Only logs after this time (RFC 3339, Unix seconds or a relative duration like 10m)."),
            )
            .attribute(Attribute::optional_string("until").description("Only logs before this time."))
            .attribute(
                Attribute::optional_string("tail")
                    .description("Number of lines from the end, or all. Default is all."),
            )
            .attribute(Attribute::optional_bool("timestamps").description("Prefix lines with timestamps. Default is false."))
            .attribute(Attribute::optional_bool("show_stdout").description("Include stdout. Default is true."))
            .attribute(Attribute::optional_bool("show_stderr").description("Include stderr. Default is true."))
            .attribute(
                Attribute::optional_bool("discard_headers")
                    .description("Strip the 8-byte multiplexing headers. Default is true."),
            )
            .attribute(Attribute::computed_string("logs_raw").description("The collected log output.")),
    )
}

#[async_trait]
impl DataSource<ProviderData> for LogsDataSource {
    fn type_name(&self) -> &'static str {
        "docker_logs"
    }

    fn schema(&self) -> Schema {
        schema()
    }

    async fn read(&self, data: &ProviderData, config: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut model: LogsDataModel = decode(config, diags)?;

        let logs = match read_logs(&data.docker, &model.request()).await {
            Ok(logs) => logs,
            Err(e) => {
                diags.error(
                    "Failed to Read Logs",
                    format!("Unable to read logs of container {}: {}", model.name, e),
                );
                return None;
            }
        };

        model.id = Some(format!("{}-{}", model.name, Utc::now().timestamp()));
        model.logs_raw = Some(logs);
        encode(&model, &schema(), diags)
    }
}
