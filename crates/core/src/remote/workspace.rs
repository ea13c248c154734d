use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;

use super::{
    ContinueMode, CueControlService, CueHandle, CueKind, CueRef, GroupMode, RemoteArg,
    RemoteCue, RemoteMessage, RemoteReply, Transport,
};
use crate::timecode::{self, TimeUnits};
use crate::CueError;

/// Cue number past the end of any list; selecting it puts new cues at the end.
pub const END_OF_LIST: &str = "9999999999";

/// Move index meaning "append to the end of the parent group".
const APPEND_INDEX: f32 = 9_999_999.0;

/// How long to wait for each acknowledgment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(100),
        }
    }
}

/// A workspace on the show controller, reached through a [`Transport`].
pub struct RemoteWorkspace<T: Transport> {
    transport: T,
    workspace_id: String,
    retry: RetryPolicy,
}

impl<T: Transport> RemoteWorkspace<T> {
    pub fn new(transport: T, workspace_id: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            workspace_id: workspace_id.into(),
            retry,
        }
    }

    /// Switches the controller to reply to every request, which acknowledgment relies on.
    pub async fn connect(
        transport: T,
        workspace_id: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self, CueError> {
        let mut workspace = Self::new(transport, workspace_id, retry);
        workspace
            .request(RemoteMessage::new("/alwaysReply").arg(1.0f32))
            .await?;
        info!("Connected to workspace {}", workspace.workspace_id);
        Ok(workspace)
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Sends a request once and waits for its acknowledgment, returning the reply payload.
    pub async fn request(&mut self, message: RemoteMessage) -> Result<Value, CueError> {
        debug!("-> {} {:?}", message.address, message.args);
        self.transport.send(&message).await?;

        for attempt in 1..=self.retry.attempts {
            match self.transport.recv(self.retry.interval).await? {
                Some(reply) if reply.acknowledges(&message.address) && reply.is_ok() => {
                    return Ok(reply.data);
                }
                Some(reply) => debug!(
                    "Ignoring reply {} ({}) while waiting for {} (attempt {})",
                    reply.address, reply.status, message.address, attempt
                ),
                None => debug!(
                    "No reply for {} (attempt {} of {})",
                    message.address, attempt, self.retry.attempts
                ),
            }
        }

        Err(CueError::RemoteNoAcknowledgment {
            address: message.address,
            attempts: self.retry.attempts,
        })
    }

    fn workspace_address(&self, path: &str) -> String {
        format!("/workspace/{}/{}", self.workspace_id, path)
    }

    fn cue_address(cue: &CueRef, property: &str) -> String {
        match cue {
            CueRef::Id(handle) => format!("/cue_id/{}/{}", handle.0, property),
            CueRef::Number(number) => format!("/cue/{}/{}", number, property),
        }
    }

    async fn set(
        &mut self,
        cue: &CueRef,
        property: &str,
        value: impl Into<RemoteArg> + Send,
    ) -> Result<(), CueError> {
        let message = RemoteMessage::new(Self::cue_address(cue, property)).arg(value);
        self.request(message).await.map(|_| ())
    }

    async fn get(&mut self, cue: &CueRef, property: &str) -> Result<(String, Value), CueError> {
        let address = Self::cue_address(cue, property);
        let data = self.request(RemoteMessage::new(address.clone())).await?;
        Ok((address, data))
    }
}

fn seconds_arg(units: TimeUnits) -> f32 {
    timecode::to_seconds(units) as f32
}

fn expect_number(address: String, data: &Value) -> Result<f64, CueError> {
    match data {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| CueError::UnexpectedReply {
        address,
        detail: format!("expected a number, got {}", data),
    })
}

fn expect_string(address: String, data: Value) -> Result<String, CueError> {
    match data {
        Value::String(text) => Ok(text),
        other => Err(CueError::UnexpectedReply {
            address,
            detail: format!("expected a string, got {}", other),
        }),
    }
}

#[async_trait]
impl<T: Transport> CueControlService for RemoteWorkspace<T> {
    async fn create(&mut self, kind: CueKind) -> Result<CueHandle, CueError> {
        let address = self.workspace_address("new");
        let data = self
            .request(RemoteMessage::new(address.clone()).arg(kind.as_str()))
            .await?;
        expect_string(address, data).map(CueHandle)
    }

    async fn move_cue(&mut self, cue: &CueHandle, parent: &CueHandle) -> Result<(), CueError> {
        let message = RemoteMessage::new(self.workspace_address(&format!("move/{}", cue.0)))
            .arg(APPEND_INDEX)
            .arg(parent.0.as_str());
        self.request(message).await.map(|_| ())
    }

    async fn delete(&mut self, cue: &CueHandle) -> Result<(), CueError> {
        let address = self.workspace_address(&format!("delete_id/{}", cue.0));
        self.request(RemoteMessage::new(address)).await.map(|_| ())
    }

    async fn set_name(&mut self, cue: &CueRef, name: &str) -> Result<(), CueError> {
        self.set(cue, "name", name).await
    }

    async fn set_mode(&mut self, cue: &CueRef, mode: GroupMode) -> Result<(), CueError> {
        self.set(cue, "mode", mode.value() as f32).await
    }

    async fn set_continue_mode(
        &mut self,
        cue: &CueRef,
        mode: ContinueMode,
    ) -> Result<(), CueError> {
        self.set(cue, "continueMode", mode.value() as f32).await
    }

    async fn set_duration(&mut self, cue: &CueRef, duration: TimeUnits) -> Result<(), CueError> {
        self.set(cue, "duration", seconds_arg(duration)).await
    }

    async fn get_duration(&mut self, cue: &CueRef) -> Result<TimeUnits, CueError> {
        let (address, data) = self.get(cue, "duration").await?;
        expect_number(address, &data).map(timecode::from_seconds)
    }

    async fn set_pre_wait(&mut self, cue: &CueRef, pre_wait: TimeUnits) -> Result<(), CueError> {
        self.set(cue, "preWait", seconds_arg(pre_wait)).await
    }

    async fn get_pre_wait(&mut self, cue: &CueRef) -> Result<TimeUnits, CueError> {
        let (address, data) = self.get(cue, "preWait").await?;
        expect_number(address, &data).map(timecode::from_seconds)
    }

    async fn set_target_id(&mut self, cue: &CueRef, target: &CueHandle) -> Result<(), CueError> {
        self.set(cue, "cueTargetId", target.0.as_str()).await
    }

    async fn set_number(&mut self, cue: &CueRef, number: &str) -> Result<(), CueError> {
        self.set(cue, "number", number).await
    }

    async fn set_color(&mut self, cue: &CueRef, color: &str) -> Result<(), CueError> {
        self.set(cue, "colorName", color).await
    }

    async fn get_light_string(&mut self, cue: &CueRef) -> Result<String, CueError> {
        let (address, data) = self.get(cue, "lightCommandText").await?;
        match data {
            Value::Null => Ok(String::new()),
            data => expect_string(address, data),
        }
    }

    async fn set_light_string(&mut self, cue: &CueRef, text: &str) -> Result<(), CueError> {
        self.set(cue, "lightCommandText", text).await
    }

    async fn get_network_patch(&mut self, cue: &CueRef) -> Result<u32, CueError> {
        let (address, data) = self.get(cue, "patch").await?;
        expect_number(address, &data).map(|patch| patch.max(0.0) as u32)
    }

    async fn set_network_patch(&mut self, cue: &CueRef, patch: u32) -> Result<(), CueError> {
        self.set(cue, "patch", patch as i32).await
    }

    async fn set_network_string(&mut self, cue: &CueRef, command: &str) -> Result<(), CueError> {
        self.set(cue, "customString", command).await
    }

    async fn select_by_id(&mut self, cue: &CueHandle) -> Result<(), CueError> {
        let address = self.workspace_address(&format!("select_id/{}", cue.0));
        self.request(RemoteMessage::new(address)).await.map(|_| ())
    }

    async fn select_by_number(&mut self, number: &str) -> Result<(), CueError> {
        let address = self.workspace_address(&format!("select/{}", number));
        self.request(RemoteMessage::new(address)).await.map(|_| ())
    }

    async fn list(&mut self) -> Result<Vec<RemoteCue>, CueError> {
        let address = self.workspace_address("cueLists");
        let data = self.request(RemoteMessage::new(address)).await?;
        Ok(serde_json::from_value(data)?)
    }
}
