//! 下载管理器的快照：全部任务记录及其续传数据，XML 编码。
//!
//! ```xml
//! <DownloadManager>
//!   <Task>
//!     <Id>0</Id>
//!     <Uri>https://example.com/a.iso</Uri>
//!     <OutputDir>/tmp</OutputDir>
//!     <State>Wait</State>
//!     <HttpConfig>...</HttpConfig>
//!     <HttpTask>...</HttpTask>
//!   </Task>
//! </DownloadManager>
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::internal::transfer::structs::{HttpConfig, ResumeData, TaskState, TransferError};

use super::download_manager::ManagerTaskId;

/// 一个任务的持久化记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(rename = "Id")]
    pub id: ManagerTaskId,
    #[serde(rename = "Uri")]
    pub uri: String,
    #[serde(rename = "OutputDir")]
    pub output_dir: PathBuf,
    #[serde(rename = "OutputName", skip_serializing_if = "Option::is_none", default)]
    pub output_name: Option<String>,
    #[serde(rename = "Comment", default)]
    pub comment: String,
    #[serde(rename = "State", with = "task_state_text")]
    pub state: TaskState,
    #[serde(rename = "TotalSize", default)]
    pub total_size: u64,
    #[serde(rename = "Downloaded", default)]
    pub downloaded: u64,
    #[serde(rename = "Error", skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(rename = "HttpConfig", default)]
    pub options: HttpConfig,
    #[serde(rename = "HttpTask", skip_serializing_if = "Option::is_none", default)]
    pub resume: Option<ResumeData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "DownloadManager")]
pub struct ManagerSnapshot {
    #[serde(rename = "Task", default)]
    pub tasks: Vec<TaskRecord>,
}

impl ManagerSnapshot {
    pub fn to_xml(&self) -> Result<String, TransferError> {
        quick_xml::se::to_string(self)
            .map_err(|e| TransferError::ResumeDataCorrupt(e.to_string()))
    }

    pub fn from_xml(text: &str) -> Result<Self, TransferError> {
        let snapshot: Self = quick_xml::de::from_str(text)
            .map_err(|e| TransferError::ResumeDataCorrupt(e.to_string()))?;
        for record in &snapshot.tasks {
            record.options.validate()?;
            if let Some(resume) = record.resume.as_ref() {
                resume.bitmap()?;
            }
        }
        Ok(snapshot)
    }
}

/// `TaskState` 以文本形式写入 `<State>`。
mod task_state_text {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::internal::transfer::structs::TaskState;

    pub fn serialize<S: Serializer>(state: &TaskState, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(match state {
            TaskState::Wait => "Wait",
            TaskState::Download => "Download",
            TaskState::Finish => "Finish",
            TaskState::Error => "Error",
        })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<TaskState, D::Error> {
        let text = String::deserialize(d)?;
        match text.trim() {
            "Wait" => Ok(TaskState::Wait),
            "Download" => Ok(TaskState::Download),
            "Finish" => Ok(TaskState::Finish),
            "Error" => Ok(TaskState::Error),
            other => Err(serde::de::Error::custom(format!("未知任务状态: {other}"))),
        }
    }
}
