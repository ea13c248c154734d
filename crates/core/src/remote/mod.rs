//! The show controller's remote cue interface.
//!
//! Every operation addresses a cue explicitly, either by the handle returned from
//! [`CueControlService::create`] or by its cue number. Nothing relies on the controller's
//! "selected cue", so configuration can never land on the wrong cue.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::timecode::TimeUnits;
use crate::CueError;

pub use transport::{RemoteArg, RemoteMessage, RemoteReply, Transport, TransportError};
pub use workspace::{RemoteWorkspace, RetryPolicy, END_OF_LIST};

mod transport;
mod workspace;

/// Unique id of a cue on the controller.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CueHandle(pub String);

impl fmt::Display for CueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a remote operation addresses its cue.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CueRef {
    Id(CueHandle),
    Number(String),
}

impl From<&CueHandle> for CueRef {
    fn from(handle: &CueHandle) -> Self {
        CueRef::Id(handle.clone())
    }
}

impl fmt::Display for CueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CueRef::Id(handle) => write!(f, "id {}", handle),
            CueRef::Number(number) => write!(f, "number {}", number),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CueKind {
    Group,
    Light,
    Wait,
    Start,
    Stop,
    Network,
}

impl CueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CueKind::Group => "group",
            CueKind::Light => "light",
            CueKind::Wait => "wait",
            CueKind::Start => "start",
            CueKind::Stop => "stop",
            CueKind::Network => "network",
        }
    }
}

/// Playback mode of a group cue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupMode {
    /// Start the first child and enter the group.
    FireFirstEnter,
    /// Start the first child and move on to the next cue.
    FireFirstGoNext,
    /// Start every child at once, each after its own pre-wait.
    Timeline,
}

impl GroupMode {
    pub fn value(&self) -> i32 {
        match self {
            GroupMode::FireFirstEnter => 1,
            GroupMode::FireFirstGoNext => 2,
            GroupMode::Timeline => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContinueMode {
    /// Start the next cue once this one finishes.
    AutoFollow,
}

impl ContinueMode {
    pub fn value(&self) -> i32 {
        match self {
            ContinueMode::AutoFollow => 2,
        }
    }
}

/// One cue in the controller's cue tree, as returned by [`CueControlService::list`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteCue {
    #[serde(rename = "uniqueID")]
    pub unique_id: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "listName", default)]
    pub list_name: String,
    #[serde(rename = "type", default)]
    pub cue_type: String,
    #[serde(default)]
    pub cues: Vec<RemoteCue>,
}

impl RemoteCue {
    /// The displayed name: the list name for cue lists and groups, otherwise the cue name.
    pub fn label(&self) -> &str {
        if self.list_name.is_empty() {
            &self.name
        } else {
            &self.list_name
        }
    }

    pub fn handle(&self) -> CueHandle {
        CueHandle(self.unique_id.clone())
    }

    /// Finds the top-level cue list with the given name.
    pub fn find_list<'a>(lists: &'a [RemoteCue], name: &str) -> Option<&'a RemoteCue> {
        lists.iter().find(|list| list.label() == name)
    }
}

/// Request/response operations offered by the show controller.
///
/// Calls are strictly sequential: each returns only once the controller acknowledged it.
#[async_trait]
pub trait CueControlService: Send {
    /// Creates a cue after the current selection and returns its handle.
    async fn create(&mut self, kind: CueKind) -> Result<CueHandle, CueError>;

    /// Moves a cue to the end of a group.
    async fn move_cue(&mut self, cue: &CueHandle, parent: &CueHandle) -> Result<(), CueError>;

    /// Deletes a cue and everything inside it.
    async fn delete(&mut self, cue: &CueHandle) -> Result<(), CueError>;

    async fn set_name(&mut self, cue: &CueRef, name: &str) -> Result<(), CueError>;

    async fn set_mode(&mut self, cue: &CueRef, mode: GroupMode) -> Result<(), CueError>;

    async fn set_continue_mode(&mut self, cue: &CueRef, mode: ContinueMode)
        -> Result<(), CueError>;

    async fn set_duration(&mut self, cue: &CueRef, duration: TimeUnits) -> Result<(), CueError>;

    async fn get_duration(&mut self, cue: &CueRef) -> Result<TimeUnits, CueError>;

    async fn set_pre_wait(&mut self, cue: &CueRef, pre_wait: TimeUnits) -> Result<(), CueError>;

    async fn get_pre_wait(&mut self, cue: &CueRef) -> Result<TimeUnits, CueError>;

    async fn set_target_id(&mut self, cue: &CueRef, target: &CueHandle) -> Result<(), CueError>;

    async fn set_number(&mut self, cue: &CueRef, number: &str) -> Result<(), CueError>;

    async fn set_color(&mut self, cue: &CueRef, color: &str) -> Result<(), CueError>;

    async fn get_light_string(&mut self, cue: &CueRef) -> Result<String, CueError>;

    async fn set_light_string(&mut self, cue: &CueRef, text: &str) -> Result<(), CueError>;

    async fn get_network_patch(&mut self, cue: &CueRef) -> Result<u32, CueError>;

    async fn set_network_patch(&mut self, cue: &CueRef, patch: u32) -> Result<(), CueError>;

    async fn set_network_string(&mut self, cue: &CueRef, command: &str) -> Result<(), CueError>;

    async fn select_by_id(&mut self, cue: &CueHandle) -> Result<(), CueError>;

    async fn select_by_number(&mut self, number: &str) -> Result<(), CueError>;

    /// Returns every cue list with its full cue tree.
    async fn list(&mut self) -> Result<Vec<RemoteCue>, CueError>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! A recording in-memory controller used by the tests of the modules above it.

    use std::collections::HashMap;

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        Create(CueKind, CueHandle),
        Move(CueHandle, CueHandle),
        Delete(CueHandle),
        SetName(CueRef, String),
        SetMode(CueRef, GroupMode),
        SetContinueMode(CueRef, ContinueMode),
        SetDuration(CueRef, TimeUnits),
        SetPreWait(CueRef, TimeUnits),
        SetTargetId(CueRef, CueHandle),
        SetNumber(CueRef, String),
        SetColor(CueRef, String),
        SetLightString(CueRef, String),
        SetNetworkPatch(CueRef, u32),
        SetNetworkString(CueRef, String),
        SelectById(CueHandle),
        SelectByNumber(String),
    }

    #[derive(Default)]
    pub struct FakeController {
        pub calls: Vec<Call>,
        pub lists: Vec<RemoteCue>,
        pub light_strings: HashMap<String, String>,
        pub durations: HashMap<String, TimeUnits>,
        pub pre_waits: HashMap<String, TimeUnits>,
        pub patches: HashMap<String, u32>,
        pub light_string_reads: usize,
        next_id: usize,
    }

    impl FakeController {
        pub fn new(lists: Vec<RemoteCue>) -> Self {
            Self {
                lists,
                ..Default::default()
            }
        }

        pub fn created(&self) -> Vec<(CueKind, CueHandle)> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Create(kind, handle) => Some((*kind, handle.clone())),
                    _ => None,
                })
                .collect()
        }

        pub fn name_of(&self, handle: &CueHandle) -> Option<String> {
            self.calls.iter().rev().find_map(|call| match call {
                Call::SetName(CueRef::Id(h), name) if h == handle => Some(name.clone()),
                _ => None,
            })
        }

        pub fn handle_named(&self, name: &str) -> Option<CueHandle> {
            self.calls.iter().find_map(|call| match call {
                Call::SetName(CueRef::Id(h), n) if n == name => Some(h.clone()),
                _ => None,
            })
        }

        pub fn parent_of(&self, handle: &CueHandle) -> Option<CueHandle> {
            self.calls.iter().find_map(|call| match call {
                Call::Move(cue, parent) if cue == handle => Some(parent.clone()),
                _ => None,
            })
        }

        fn key(cue: &CueRef) -> String {
            match cue {
                CueRef::Id(handle) => handle.0.clone(),
                CueRef::Number(number) => number.clone(),
            }
        }
    }

    #[async_trait]
    impl CueControlService for FakeController {
        async fn create(&mut self, kind: CueKind) -> Result<CueHandle, CueError> {
            self.next_id += 1;
            let handle = CueHandle(format!("cue-{}", self.next_id));
            self.calls.push(Call::Create(kind, handle.clone()));
            Ok(handle)
        }

        async fn move_cue(&mut self, cue: &CueHandle, parent: &CueHandle) -> Result<(), CueError> {
            self.calls.push(Call::Move(cue.clone(), parent.clone()));
            Ok(())
        }

        async fn delete(&mut self, cue: &CueHandle) -> Result<(), CueError> {
            self.calls.push(Call::Delete(cue.clone()));
            Ok(())
        }

        async fn set_name(&mut self, cue: &CueRef, name: &str) -> Result<(), CueError> {
            self.calls.push(Call::SetName(cue.clone(), name.to_string()));
            Ok(())
        }

        async fn set_mode(&mut self, cue: &CueRef, mode: GroupMode) -> Result<(), CueError> {
            self.calls.push(Call::SetMode(cue.clone(), mode));
            Ok(())
        }

        async fn set_continue_mode(
            &mut self,
            cue: &CueRef,
            mode: ContinueMode,
        ) -> Result<(), CueError> {
            self.calls.push(Call::SetContinueMode(cue.clone(), mode));
            Ok(())
        }

        async fn set_duration(&mut self, cue: &CueRef, duration: TimeUnits) -> Result<(), CueError> {
            self.calls.push(Call::SetDuration(cue.clone(), duration));
            Ok(())
        }

        async fn get_duration(&mut self, cue: &CueRef) -> Result<TimeUnits, CueError> {
            Ok(self.durations.get(&Self::key(cue)).copied().unwrap_or(0))
        }

        async fn set_pre_wait(&mut self, cue: &CueRef, pre_wait: TimeUnits) -> Result<(), CueError> {
            self.calls.push(Call::SetPreWait(cue.clone(), pre_wait));
            Ok(())
        }

        async fn get_pre_wait(&mut self, cue: &CueRef) -> Result<TimeUnits, CueError> {
            Ok(self.pre_waits.get(&Self::key(cue)).copied().unwrap_or(0))
        }

        async fn set_target_id(&mut self, cue: &CueRef, target: &CueHandle) -> Result<(), CueError> {
            self.calls.push(Call::SetTargetId(cue.clone(), target.clone()));
            Ok(())
        }

        async fn set_number(&mut self, cue: &CueRef, number: &str) -> Result<(), CueError> {
            self.calls.push(Call::SetNumber(cue.clone(), number.to_string()));
            Ok(())
        }

        async fn set_color(&mut self, cue: &CueRef, color: &str) -> Result<(), CueError> {
            self.calls.push(Call::SetColor(cue.clone(), color.to_string()));
            Ok(())
        }

        async fn get_light_string(&mut self, cue: &CueRef) -> Result<String, CueError> {
            self.light_string_reads += 1;
            Ok(self
                .light_strings
                .get(&Self::key(cue))
                .cloned()
                .unwrap_or_default())
        }

        async fn set_light_string(&mut self, cue: &CueRef, text: &str) -> Result<(), CueError> {
            self.calls.push(Call::SetLightString(cue.clone(), text.to_string()));
            Ok(())
        }

        async fn get_network_patch(&mut self, cue: &CueRef) -> Result<u32, CueError> {
            Ok(self.patches.get(&Self::key(cue)).copied().unwrap_or(0))
        }

        async fn set_network_patch(&mut self, cue: &CueRef, patch: u32) -> Result<(), CueError> {
            self.calls.push(Call::SetNetworkPatch(cue.clone(), patch));
            Ok(())
        }

        async fn set_network_string(&mut self, cue: &CueRef, command: &str) -> Result<(), CueError> {
            self.calls
                .push(Call::SetNetworkString(cue.clone(), command.to_string()));
            Ok(())
        }

        async fn select_by_id(&mut self, cue: &CueHandle) -> Result<(), CueError> {
            self.calls.push(Call::SelectById(cue.clone()));
            Ok(())
        }

        async fn select_by_number(&mut self, number: &str) -> Result<(), CueError> {
            self.calls.push(Call::SelectByNumber(number.to_string()));
            Ok(())
        }

        async fn list(&mut self) -> Result<Vec<RemoteCue>, CueError> {
            Ok(self.lists.clone())
        }
    }

    /// Builds a cue tree node for tests.
    pub fn cue(name: &str, number: &str, cue_type: &str, cues: Vec<RemoteCue>) -> RemoteCue {
        RemoteCue {
            unique_id: format!("id-{}", name.to_lowercase().replace(' ', "-")),
            number: number.to_string(),
            name: name.to_string(),
            list_name: if cue_type == "Group" || cue_type == "Cue List" {
                name.to_string()
            } else {
                String::new()
            },
            cue_type: cue_type.to_string(),
            cues,
        }
    }
}
