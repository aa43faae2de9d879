//! Transient add/edit surfaces and the contracts the coordinator uses to drive them.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use shared::{
    domain::{Member, MemberPatch},
    error::ValidationError,
    protocol::{ControlNotification, EditTarget, MemberMode, MemberNotification},
};
use thiserror::Error;

use crate::bus::{BusError, NotificationBus, SubscriptionId};

/// Anything that can be dismissed. Closing twice must be harmless.
pub trait Closable {
    fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Add,
    Edit,
}

impl SurfaceKind {
    pub fn mode(self) -> MemberMode {
        match self {
            Self::Add => MemberMode::Add,
            Self::Edit => MemberMode::Update,
        }
    }
}

/// Opens transient surfaces on behalf of the coordinator.
pub trait SurfaceHost {
    fn open(&self, kind: SurfaceKind);
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("surface is closed")]
    Closed,
    #[error("operation is only available on an edit surface")]
    NotEditing,
    #[error("edit surface has not received a member to edit")]
    NoTarget,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// A UI-agnostic add or edit form publishing its result on the bus.
pub struct MemberForm {
    kind: SurfaceKind,
    bus: Rc<NotificationBus>,
    target: Rc<RefCell<Option<Member>>>,
    subscription: Cell<Option<SubscriptionId>>,
    closed: Cell<bool>,
}

impl MemberForm {
    pub fn open(bus: Rc<NotificationBus>, kind: SurfaceKind) -> Self {
        let target = Rc::new(RefCell::new(None));
        let subscription = match kind {
            SurfaceKind::Edit => {
                let slot = Rc::clone(&target);
                Some(bus.register::<EditTarget, _>(move |msg| {
                    let mut slot = slot.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(msg.member.clone());
                    }
                    Ok(())
                }))
            }
            SurfaceKind::Add => None,
        };
        tracing::debug!(?kind, "member form opened");

        Self {
            kind,
            bus,
            target,
            subscription: Cell::new(subscription),
            closed: Cell::new(false),
        }
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// The member this edit form was pre-populated with.
    pub fn target(&self) -> Option<Member> {
        self.target.borrow().clone()
    }

    /// Builds the record from `patch` and publishes it with this form's mode.
    pub fn submit(&self, patch: MemberPatch) -> Result<Member, SurfaceError> {
        self.ensure_open()?;
        let member = match self.kind {
            SurfaceKind::Add => patch.into_new_member()?,
            SurfaceKind::Edit => {
                let mut member = self.target().ok_or(SurfaceError::NoTarget)?;
                patch.apply(&mut member);
                member
            }
        };
        member.validate()?;

        self.bus.send(&MemberNotification {
            member: member.clone(),
            mode: self.kind.mode(),
        })?;
        Ok(member)
    }

    /// Asks the coordinator to remove the member being edited.
    pub fn delete(&self) -> Result<(), SurfaceError> {
        self.ensure_open()?;
        if self.kind != SurfaceKind::Edit {
            return Err(SurfaceError::NotEditing);
        }
        if self.target.borrow().is_none() {
            return Err(SurfaceError::NoTarget);
        }
        self.bus.send(&ControlNotification::delete())?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SurfaceError> {
        if self.closed.get() {
            Err(SurfaceError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Closable for MemberForm {
    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        if let Some(id) = self.subscription.take() {
            self.bus.unregister(id);
        }
        tracing::debug!(kind = ?self.kind, "member form closed");
    }
}

impl Drop for MemberForm {
    fn drop(&mut self) {
        self.close();
    }
}

/// [`SurfaceHost`] that opens [`MemberForm`]s on a shared bus.
pub struct FormHost {
    bus: Rc<NotificationBus>,
    opened: RefCell<Vec<Rc<MemberForm>>>,
}

impl FormHost {
    pub fn new(bus: Rc<NotificationBus>) -> Self {
        Self {
            bus,
            opened: RefCell::new(Vec::new()),
        }
    }

    /// Most recently opened form of `kind` that is still open.
    pub fn latest(&self, kind: SurfaceKind) -> Option<Rc<MemberForm>> {
        self.opened
            .borrow()
            .iter()
            .rev()
            .find(|form| form.kind() == kind && !form.is_closed())
            .cloned()
    }

    pub fn open_count(&self) -> usize {
        self.opened
            .borrow()
            .iter()
            .filter(|form| !form.is_closed())
            .count()
    }
}

impl SurfaceHost for FormHost {
    fn open(&self, kind: SurfaceKind) {
        let mut opened = self.opened.borrow_mut();
        opened.retain(|form| !form.is_closed());
        opened.push(Rc::new(MemberForm::open(Rc::clone(&self.bus), kind)));
    }
}

#[cfg(test)]
#[path = "tests/surface_tests.rs"]
mod tests;
