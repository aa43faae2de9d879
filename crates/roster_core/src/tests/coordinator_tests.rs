use std::cell::Cell;

use shared::domain::{MemberPatch, MembershipStatus};

use super::*;
use crate::{
    bus::BusError,
    gateway::StorageGateway,
    surface::{FormHost, MemberForm},
};

#[derive(Clone, Default)]
struct RecordingGateway {
    initial: Vec<Member>,
    saves: Rc<RefCell<Vec<Vec<Member>>>>,
    fail_saves: Rc<Cell<bool>>,
}

impl RecordingGateway {
    fn with_members(initial: Vec<Member>) -> Self {
        Self {
            initial,
            ..Default::default()
        }
    }

    fn save_count(&self) -> usize {
        self.saves.borrow().len()
    }

    fn last_saved(&self) -> Option<Vec<Member>> {
        self.saves.borrow().last().cloned()
    }
}

impl MemberGateway for RecordingGateway {
    fn load_all(&self) -> Result<Vec<Member>> {
        Ok(self.initial.clone())
    }

    fn save_all(&self, members: &[Member]) -> Result<()> {
        if self.fail_saves.get() {
            anyhow::bail!("disk is read-only");
        }
        self.saves.borrow_mut().push(members.to_vec());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingHost {
    opened: RefCell<Vec<SurfaceKind>>,
}

impl SurfaceHost for RecordingHost {
    fn open(&self, kind: SurfaceKind) {
        self.opened.borrow_mut().push(kind);
    }
}

#[derive(Default)]
struct CountingSurface {
    closes: Cell<u32>,
    closed: Cell<bool>,
}

impl Closable for CountingSurface {
    fn close(&self) {
        if !self.closed.replace(true) {
            self.closes.set(self.closes.get() + 1);
        }
    }
}

struct Harness {
    bus: Rc<NotificationBus>,
    gateway: RecordingGateway,
    host: Rc<RecordingHost>,
    coordinator: Rc<RosterCoordinator>,
}

fn harness(initial: Vec<Member>) -> Harness {
    let bus = Rc::new(NotificationBus::new());
    let gateway = RecordingGateway::with_members(initial);
    let host = Rc::new(RecordingHost::default());
    let coordinator = RosterCoordinator::start(
        Box::new(gateway.clone()),
        host.clone(),
        Rc::clone(&bus),
    )
    .expect("start");
    Harness {
        bus,
        gateway,
        host,
        coordinator,
    }
}

fn member(first: &str) -> Member {
    Member::new(first, "Tester", format!("{}@gym.test", first.to_lowercase()), "")
}

fn edited(original: &Member, email: &str) -> Member {
    let mut copy = original.clone();
    copy.email = email.to_string();
    copy
}

#[test]
fn hydrates_from_gateway_on_start() {
    let m1 = member("Ada");
    let h = harness(vec![m1.clone()]);
    assert_eq!(h.coordinator.members(), vec![m1]);
    assert_eq!(h.gateway.save_count(), 0);
    assert!(h.coordinator.selected_member().is_none());
}

#[test]
fn add_to_empty_roster_saves_once() {
    let h = harness(Vec::new());
    let m1 = member("Ada");

    h.bus
        .send(&MemberNotification::add(m1.clone()))
        .expect("send");

    assert_eq!(h.coordinator.members(), vec![m1.clone()]);
    assert_eq!(h.gateway.save_count(), 1);
    assert_eq!(h.gateway.last_saved(), Some(vec![m1]));
}

#[test]
fn add_of_existing_id_replaces_entry_in_place() {
    let (m1, m2) = (member("Ada"), member("Bea"));
    let h = harness(vec![m1.clone(), m2.clone()]);
    let m1_again = edited(&m1, "ada@resubmitted.test");

    h.bus
        .send(&MemberNotification::add(m1_again.clone()))
        .expect("send");

    assert_eq!(h.coordinator.members(), vec![m1_again.clone(), m2]);
    assert_eq!(h.gateway.save_count(), 1);
}

#[test]
fn double_submitted_add_keeps_later_saves_working() {
    let bus = Rc::new(NotificationBus::new());
    let gateway = StorageGateway::open("sqlite::memory:").expect("gateway");
    let coordinator = RosterCoordinator::start(
        Box::new(gateway),
        Rc::new(RecordingHost::default()),
        Rc::clone(&bus),
    )
    .expect("start");
    let (ada, bea) = (member("Ada"), member("Bea"));

    bus.send(&MemberNotification::add(ada.clone())).expect("first add");
    bus.send(&MemberNotification::add(ada.clone()))
        .expect("repeated add");
    bus.send(&MemberNotification::add(bea.clone()))
        .expect("unrelated add");

    assert_eq!(coordinator.members(), vec![ada, bea]);
}

#[test]
fn repeated_adds_preserve_order_and_save_each_time() {
    let h = harness(Vec::new());
    let roster: Vec<Member> = ["Ada", "Bea", "Cy", "Dee", "Eve"]
        .into_iter()
        .map(member)
        .collect();

    for m in &roster {
        h.bus.send(&MemberNotification::add(m.clone())).expect("send");
    }

    assert_eq!(h.coordinator.members(), roster);
    assert_eq!(h.gateway.save_count(), roster.len());
}

#[test]
fn update_replaces_selected_member() {
    let m1 = member("Ada");
    let h = harness(vec![m1.clone()]);
    assert!(h.coordinator.select(Some(m1.id)));

    let m1_prime = edited(&m1, "ada@lovelace.test");
    h.bus
        .send(&MemberNotification::update(m1_prime.clone()))
        .expect("send");

    assert_eq!(h.coordinator.members(), vec![m1_prime.clone()]);
    assert_eq!(h.gateway.save_count(), 1);
    assert_eq!(h.coordinator.selected_member(), Some(m1_prime));
}

#[test]
fn update_moves_replacement_to_end() {
    let (m1, m2, m3) = (member("Ada"), member("Bea"), member("Cy"));
    let h = harness(vec![m1.clone(), m2.clone(), m3.clone()]);
    h.coordinator.select(Some(m1.id));

    let m1_prime = edited(&m1, "new@gym.test");
    h.coordinator
        .on_member_notification(&MemberNotification::update(m1_prime.clone()))
        .expect("update");

    assert_eq!(h.coordinator.members(), vec![m2, m3, m1_prime]);
}

#[test]
fn update_without_selection_keeps_length_for_known_member() {
    let (m1, m2) = (member("Ada"), member("Bea"));
    let h = harness(vec![m1.clone(), m2.clone()]);

    h.bus
        .send(&MemberNotification::update(edited(&m2, "bea@new.test")))
        .expect("send");

    let members = h.coordinator.members();
    assert_eq!(members.len(), 2);
    assert_eq!(members.iter().filter(|m| m.id == m2.id).count(), 1);
    assert_eq!(h.gateway.save_count(), 1);
}

#[test]
fn update_of_absent_member_without_selection_acts_as_add() {
    let m1 = member("Ada");
    let h = harness(vec![m1.clone()]);
    let stranger = member("Zed");

    h.bus
        .send(&MemberNotification::update(stranger.clone()))
        .expect("send");

    assert_eq!(h.coordinator.members(), vec![m1, stranger]);
    assert_eq!(h.gateway.save_count(), 1);
}

#[test]
fn delete_removes_selected_member() {
    let (m1, m2) = (member("Ada"), member("Bea"));
    let h = harness(vec![m1.clone(), m2.clone()]);
    h.coordinator.select(Some(m2.id));

    h.bus.send(&ControlNotification::delete()).expect("send");

    assert_eq!(h.coordinator.members(), vec![m1]);
    assert_eq!(h.gateway.save_count(), 1);
    assert!(h.coordinator.selected_member().is_none());
}

#[test]
fn delete_without_selection_is_a_no_op() {
    let m1 = member("Ada");
    let h = harness(vec![m1.clone()]);

    h.bus.send(&ControlNotification::delete()).expect("send");

    assert_eq!(h.coordinator.members(), vec![m1]);
    assert_eq!(h.gateway.save_count(), 0);
}

#[test]
fn second_delete_after_removal_does_not_save_again() {
    let m1 = member("Ada");
    let h = harness(vec![m1.clone()]);
    h.coordinator.select(Some(m1.id));

    h.bus.send(&ControlNotification::delete()).expect("first");
    h.bus.send(&ControlNotification::delete()).expect("second");

    assert!(h.coordinator.is_empty());
    assert_eq!(h.gateway.save_count(), 1);
}

#[test]
fn selecting_unknown_member_clears_selection() {
    let m1 = member("Ada");
    let h = harness(vec![m1.clone()]);
    assert!(h.coordinator.select(Some(m1.id)));
    assert!(!h.coordinator.select(Some(MemberId::new())));
    assert!(h.coordinator.selected_member().is_none());
    assert!(h.coordinator.select(None));
}

#[test]
fn exit_with_no_surface_does_nothing() {
    let h = harness(Vec::new());
    h.coordinator.request_exit(None);
    assert!(h.host.opened.borrow().is_empty());
    assert_eq!(h.gateway.save_count(), 0);
}

#[test]
fn exit_closes_surface_once() {
    let h = harness(Vec::new());
    let surface = CountingSurface::default();

    h.coordinator.request_exit(Some(&surface));
    h.coordinator.request_exit(Some(&surface));

    assert_eq!(surface.closes.get(), 1);
}

#[test]
fn request_add_opens_surface_without_saving() {
    let h = harness(Vec::new());
    h.coordinator.request_add();

    assert_eq!(*h.host.opened.borrow(), vec![SurfaceKind::Add]);
    assert_eq!(h.gateway.save_count(), 0);
    assert!(h.coordinator.is_empty());
}

#[test]
fn request_edit_requires_selection() {
    let h = harness(vec![member("Ada")]);
    assert!(!h.coordinator.request_edit().expect("edit"));
    assert!(h.host.opened.borrow().is_empty());
}

#[test]
fn request_edit_publishes_selected_member() {
    let m1 = member("Ada");
    let h = harness(vec![m1.clone()]);
    h.coordinator.select(Some(m1.id));

    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    h.bus.register::<EditTarget, _>(move |msg| {
        sink.borrow_mut().push(msg.member.clone());
        Ok(())
    });

    assert!(h.coordinator.request_edit().expect("edit"));
    assert_eq!(*h.host.opened.borrow(), vec![SurfaceKind::Edit]);
    assert_eq!(*received.borrow(), vec![m1]);
    assert_eq!(h.gateway.save_count(), 0);
}

#[test]
fn persistence_failure_propagates_to_sender() {
    let h = harness(Vec::new());
    h.gateway.fail_saves.set(true);

    let err = h
        .bus
        .send(&MemberNotification::add(member("Ada")))
        .expect_err("save failure");

    assert!(matches!(err, BusError::Handler { .. }));
    assert!(format!("{err}").contains("read-only"));
    assert_eq!(h.coordinator.len(), 1);
}

#[test]
fn observers_see_every_accepted_change() {
    let m1 = member("Ada");
    let h = harness(Vec::new());
    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changes);
    h.coordinator
        .subscribe_changes(move |change| sink.borrow_mut().push(change.clone()));

    h.bus
        .send(&MemberNotification::add(m1.clone()))
        .expect("add");
    h.bus.send(&ControlNotification::delete()).expect("no-op delete");
    h.coordinator.select(Some(m1.id));
    h.bus.send(&ControlNotification::delete()).expect("delete");

    assert_eq!(
        *changes.borrow(),
        vec![RosterChange::Added(m1.clone()), RosterChange::Removed(m1.id)]
    );
}

#[test]
fn observer_may_subscribe_while_notified() {
    let h = harness(Vec::new());
    let late_calls = Rc::new(Cell::new(0));
    let weak = Rc::downgrade(&h.coordinator);
    let counter = Rc::clone(&late_calls);
    h.coordinator.subscribe_changes(move |_| {
        if let Some(coordinator) = weak.upgrade() {
            let counter = Rc::clone(&counter);
            coordinator.subscribe_changes(move |_| counter.set(counter.get() + 1));
        }
    });

    h.bus
        .send(&MemberNotification::add(member("Ada")))
        .expect("first");
    assert_eq!(late_calls.get(), 0);

    h.bus
        .send(&MemberNotification::add(member("Bea")))
        .expect("second");
    assert_eq!(late_calls.get(), 1);
}

#[test]
fn dropping_coordinator_unregisters_handlers() {
    let h = harness(Vec::new());
    assert_eq!(h.bus.handler_count::<MemberNotification>(), 1);
    assert_eq!(h.bus.handler_count::<ControlNotification>(), 1);

    let Harness { bus, coordinator, .. } = h;
    drop(coordinator);

    assert_eq!(bus.handler_count::<MemberNotification>(), 0);
    assert_eq!(bus.handler_count::<ControlNotification>(), 0);
}

#[test]
fn forms_drive_full_member_lifecycle() {
    let bus = Rc::new(NotificationBus::new());
    let gateway = RecordingGateway::default();
    let forms = Rc::new(FormHost::new(Rc::clone(&bus)));
    let coordinator =
        RosterCoordinator::start(Box::new(gateway.clone()), forms.clone(), Rc::clone(&bus))
            .expect("start");

    coordinator.request_add();
    let add_form = forms.latest(SurfaceKind::Add).expect("add form");
    let added = add_form
        .submit(MemberPatch {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            email: Some("ada@gym.test".into()),
            ..Default::default()
        })
        .expect("submit add");
    coordinator.request_exit(Some(add_form.as_ref() as &dyn Closable));
    assert_eq!(coordinator.members(), vec![added.clone()]);

    coordinator.select(Some(added.id));
    assert!(coordinator.request_edit().expect("edit"));
    let edit_form: Rc<MemberForm> = forms.latest(SurfaceKind::Edit).expect("edit form");
    assert_eq!(edit_form.target(), Some(added.clone()));
    let updated = edit_form
        .submit(MemberPatch {
            status: Some(MembershipStatus::Suspended),
            ..Default::default()
        })
        .expect("submit edit");
    assert_eq!(updated.id, added.id);
    assert_eq!(coordinator.members(), vec![updated]);

    edit_form.delete().expect("delete");
    coordinator.request_exit(Some(edit_form.as_ref() as &dyn Closable));

    assert!(coordinator.is_empty());
    assert_eq!(gateway.save_count(), 3);
    assert_eq!(forms.open_count(), 0);
}
