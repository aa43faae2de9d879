//! The roster coordinator: sole owner of the member list and the current selection.
//!
//! Mutations only arrive through the two bus handlers registered in [`RosterCoordinator::start`].
//! Every accepted mutation is followed by exactly one full-roster save.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use anyhow::{Context, Result};
use shared::{
    domain::{Member, MemberId},
    protocol::{ControlKind, ControlNotification, EditTarget, MemberMode, MemberNotification},
};
use tracing::{debug, error, info};

use crate::{
    bus::{NotificationBus, SubscriptionId},
    gateway::MemberGateway,
    surface::{Closable, SurfaceHost, SurfaceKind},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange {
    Added(Member),
    Updated {
        replaced: Option<MemberId>,
        member: Member,
    },
    Removed(MemberId),
}

#[derive(Debug, Default)]
struct RosterState {
    members: Vec<Member>,
    selected: Option<MemberId>,
}

impl RosterState {
    fn remove(&mut self, id: MemberId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.id != id);
        self.members.len() != before
    }
}

type ChangeObserver = Rc<dyn Fn(&RosterChange)>;

pub struct RosterCoordinator {
    state: RefCell<RosterState>,
    gateway: Box<dyn MemberGateway>,
    surfaces: Rc<dyn SurfaceHost>,
    bus: Rc<NotificationBus>,
    observers: RefCell<Vec<ChangeObserver>>,
    subscriptions: Vec<SubscriptionId>,
}

impl RosterCoordinator {
    /// Hydrates the roster from `gateway` and subscribes to member and control notifications.
    pub fn start(
        gateway: Box<dyn MemberGateway>,
        surfaces: Rc<dyn SurfaceHost>,
        bus: Rc<NotificationBus>,
    ) -> Result<Rc<Self>> {
        let members = gateway.load_all().context("failed to hydrate roster")?;
        info!(members = members.len(), "roster loaded");

        let coordinator = Rc::new_cyclic(|weak: &Weak<Self>| {
            let on_member = Weak::clone(weak);
            let member_sub = bus.register::<MemberNotification, _>(move |msg| {
                match on_member.upgrade() {
                    Some(coordinator) => coordinator.on_member_notification(msg),
                    None => Ok(()),
                }
            });
            let on_control = Weak::clone(weak);
            let control_sub = bus.register::<ControlNotification, _>(move |msg| {
                match on_control.upgrade() {
                    Some(coordinator) => coordinator.on_control_notification(msg),
                    None => Ok(()),
                }
            });

            Self {
                state: RefCell::new(RosterState {
                    members,
                    selected: None,
                }),
                gateway,
                surfaces,
                bus: Rc::clone(&bus),
                observers: RefCell::new(Vec::new()),
                subscriptions: vec![member_sub, control_sub],
            }
        });

        Ok(coordinator)
    }

    pub fn members(&self) -> Vec<Member> {
        self.state.borrow().members.clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().members.is_empty()
    }

    pub fn find(&self, id: MemberId) -> Option<Member> {
        self.state
            .borrow()
            .members
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    /// The selected member, or `None` if nothing is selected or the entry is gone.
    pub fn selected_member(&self) -> Option<Member> {
        let state = self.state.borrow();
        let id = state.selected?;
        state.members.iter().find(|m| m.id == id).cloned()
    }

    /// Selects `id`. Selecting an id that is not in the roster clears the selection.
    pub fn select(&self, id: Option<MemberId>) -> bool {
        let mut state = self.state.borrow_mut();
        let found = id.filter(|id| state.members.iter().any(|m| m.id == *id));
        state.selected = found;
        found.is_some() || id.is_none()
    }

    pub fn subscribe_changes(&self, observer: impl Fn(&RosterChange) + 'static) {
        self.observers.borrow_mut().push(Rc::new(observer));
    }

    pub fn request_add(&self) {
        debug!("opening add surface");
        self.surfaces.open(SurfaceKind::Add);
    }

    /// Opens an edit surface for the selected member. Returns `false` when nothing is selected.
    pub fn request_edit(&self) -> Result<bool> {
        let Some(selected) = self.selected_member() else {
            debug!("edit requested without a selection");
            return Ok(false);
        };

        debug!(member = %selected.id, "opening edit surface");
        self.surfaces.open(SurfaceKind::Edit);
        self.bus
            .send(&EditTarget { member: selected })
            .context("failed to hand member to edit surface")?;
        Ok(true)
    }

    pub fn request_exit(&self, surface: Option<&dyn Closable>) {
        if let Some(surface) = surface {
            surface.close();
        }
    }

    pub fn on_member_notification(&self, msg: &MemberNotification) -> Result<()> {
        let change = {
            let mut state = self.state.borrow_mut();
            match msg.mode {
                MemberMode::Add => {
                    // an add for an id already on the roster replaces that entry in place
                    let existing = state.members.iter().position(|m| m.id == msg.member.id);
                    match existing {
                        Some(index) => {
                            state.members[index] = msg.member.clone();
                            RosterChange::Updated {
                                replaced: Some(msg.member.id),
                                member: msg.member.clone(),
                            }
                        }
                        None => {
                            state.members.push(msg.member.clone());
                            RosterChange::Added(msg.member.clone())
                        }
                    }
                }
                MemberMode::Update => {
                    let selected = state.selected;
                    let replaced = selected.filter(|id| state.remove(*id));
                    // the incoming record may not be the selected one; never keep two copies
                    let replaced = if state.remove(msg.member.id) {
                        Some(msg.member.id)
                    } else {
                        replaced
                    };
                    if state.selected.is_some_and(|id| id != msg.member.id) {
                        state.selected = None;
                    }
                    state.members.push(msg.member.clone());
                    RosterChange::Updated {
                        replaced,
                        member: msg.member.clone(),
                    }
                }
            }
        };

        info!(mode = %msg.mode, member = %msg.member.id, "member notification applied");
        self.persist(&change)
    }

    pub fn on_control_notification(&self, msg: &ControlNotification) -> Result<()> {
        match msg.kind {
            ControlKind::Delete => {
                let removed = {
                    let mut state = self.state.borrow_mut();
                    let selected = state.selected.take();
                    selected.filter(|id| state.remove(*id))
                };
                let Some(id) = removed else {
                    debug!("delete ignored: no selected member in roster");
                    return Ok(());
                };
                info!(member = %id, "member deleted");
                self.persist(&RosterChange::Removed(id))
            }
        }
    }

    fn persist(&self, change: &RosterChange) -> Result<()> {
        let snapshot = self.members();
        if let Err(err) = self.gateway.save_all(&snapshot) {
            error!(error = %format!("{err:#}"), "failed to persist roster");
            return Err(err);
        }

        // observers may subscribe further observers while being notified
        let observers: Vec<ChangeObserver> = self.observers.borrow().iter().cloned().collect();
        for observer in observers {
            observer(change);
        }
        Ok(())
    }
}

impl Drop for RosterCoordinator {
    fn drop(&mut self) {
        for id in &self.subscriptions {
            self.bus.unregister(*id);
        }
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
