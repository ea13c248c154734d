use std::collections::HashMap;

use cuegraph_fixtures as fixtures;
use log::debug;

use crate::graph::{CueGraphNode, NodeId, NodeKind};
use crate::remote::{CueControlService, CueHandle, CueRef};
use crate::CueError;

enum Step<'g> {
    Enter(&'g CueGraphNode, Option<CueHandle>),
    Exit(CueHandle, Option<CueHandle>),
}

/// Builds a compiled cue graph on the controller, one request at a time.
///
/// Every cue is created and fully configured before anything else is created; its children are
/// then built and moved into it, and finally the cue itself is moved into its parent. A failed
/// request stops the run immediately, leaving whatever was built so far in place.
pub struct Sequencer<'s, S: CueControlService + ?Sized> {
    service: &'s mut S,
    handles: HashMap<NodeId, CueHandle>,
    created: usize,
}

impl<'s, S: CueControlService + ?Sized> Sequencer<'s, S> {
    pub fn new(service: &'s mut S) -> Self {
        Self {
            service,
            handles: HashMap::new(),
            created: 0,
        }
    }

    /// Number of cues created so far.
    pub fn created(&self) -> usize {
        self.created
    }

    pub fn handle(&self, id: NodeId) -> Option<&CueHandle> {
        self.handles.get(&id)
    }

    /// Emits `root` and its descendants. With a `parent` the root is moved into it, otherwise it
    /// stays where the controller created it.
    pub async fn emit(
        &mut self,
        root: &CueGraphNode,
        parent: Option<&CueHandle>,
    ) -> Result<CueHandle, CueError> {
        let mut stack = vec![Step::Enter(root, parent.cloned())];
        let mut root_handle = None;

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(node, parent) => {
                    let handle = self.create_and_configure(node).await?;
                    if node.id == root.id {
                        root_handle = Some(handle.clone());
                    }
                    stack.push(Step::Exit(handle.clone(), parent));
                    stack.extend(
                        node.children
                            .iter()
                            .rev()
                            .map(|child| Step::Enter(child, Some(handle.clone()))),
                    );
                }
                Step::Exit(handle, Some(parent)) => {
                    self.service.move_cue(&handle, &parent).await?;
                }
                Step::Exit(_, None) => {}
            }
        }

        root_handle.ok_or(CueError::UnresolvedTarget(root.id))
    }

    async fn create_and_configure(&mut self, node: &CueGraphNode) -> Result<CueHandle, CueError> {
        let handle = self.service.create(node.cue_kind()).await?;
        let cue = CueRef::from(&handle);
        debug!("Created {} '{}' as {}", node.cue_kind().as_str(), node.name, handle);

        self.service.set_name(&cue, &node.name).await?;

        match &node.kind {
            NodeKind::Group {
                mode,
                number,
                color,
            } => {
                self.service.set_mode(&cue, *mode).await?;
                if let Some(number) = number {
                    self.service.set_number(&cue, number).await?;
                }
                if let Some(color) = color {
                    self.service.set_color(&cue, color).await?;
                }
            }
            NodeKind::Light {
                fixtures: values,
                duration,
            } => {
                self.service
                    .set_light_string(&cue, &fixtures::encode(values))
                    .await?;
                self.service.set_duration(&cue, *duration).await?;
            }
            NodeKind::Wait { duration } => {
                self.service.set_duration(&cue, *duration).await?;
            }
            NodeKind::Start { target } | NodeKind::Stop { target } => {
                let target = self
                    .handles
                    .get(target)
                    .cloned()
                    .ok_or(CueError::UnresolvedTarget(*target))?;
                self.service.set_target_id(&cue, &target).await?;
            }
            NodeKind::NetworkCommand { patch, command } => {
                self.service.set_network_patch(&cue, *patch).await?;
                self.service.set_network_string(&cue, command).await?;
            }
        }

        if let Some(pre_wait) = node.pre_wait {
            self.service.set_pre_wait(&cue, pre_wait).await?;
        }
        if let Some(mode) = node.continue_mode {
            self.service.set_continue_mode(&cue, mode).await?;
        }

        self.handles.insert(node.id, handle.clone());
        self.created += 1;
        Ok(handle)
    }
}
