//! End-to-end lifecycle coverage through the engine: both creation paths,
//! reviews, point awards, and the role/ownership gates.

mod support;

use std::sync::{mpsc, Arc};

use chrono::{Duration, Utc};
use merit::error::Error;
use merit::relay::{ConnectionRegistry, Notification};
use merit::task::{
    AssignTask, ReviewDecision, ReviewTask, SubmitTask, TaskStatus, TaskType,
};
use merit::user::Role;
use support::TestApp;

fn submit_request(title: &str, task_type: TaskType) -> SubmitTask {
    SubmitTask {
        title: title.to_string(),
        description: "details".to_string(),
        task_type,
    }
}

fn approve(task_id: &str, points: Option<i64>) -> ReviewTask {
    ReviewTask {
        task_id: task_id.to_string(),
        decision: ReviewDecision::Approved,
        awarded_points: points,
        rejection_reason: None,
    }
}

fn reject(task_id: &str, reason: Option<&str>) -> ReviewTask {
    ReviewTask {
        task_id: task_id.to_string(),
        decision: ReviewDecision::Rejected,
        awarded_points: None,
        rejection_reason: reason.map(str::to_string),
    }
}

#[test]
fn submitted_task_is_approved_and_credited() {
    let app = TestApp::new();
    let registry = Arc::new(ConnectionRegistry::new());
    let mut engine = app.engine_with(registry.clone());

    let alice = app.register(&engine, "alice", Role::User);
    let admin = app.register(&engine, "root", Role::Admin);

    let (admin_tx, admin_rx) = mpsc::channel();
    let (alice_tx, alice_rx) = mpsc::channel();
    registry.register(admin.id.clone(), admin_tx);
    registry.register(alice.id.clone(), alice_tx);

    let task = engine
        .submit_task(&alice, submit_request("Write a tutorial", TaskType::ContentCreation))
        .unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.points, 50);
    assert_eq!(task.submitted_by.as_deref(), Some(alice.id.as_str()));

    // Admins hear about the submission.
    match admin_rx.try_recv().unwrap() {
        Notification::TaskSubmitted { task_id, submitter_id, .. } => {
            assert_eq!(task_id, task.id);
            assert_eq!(submitter_id, alice.id);
        }
        other => panic!("unexpected notification: {other:?}"),
    }

    let reviewed = engine.review_task(&admin, approve(&task.id, None)).unwrap();
    assert_eq!(reviewed.status, TaskStatus::Approved);
    assert_eq!(reviewed.awarded_points, Some(50));
    assert_eq!(reviewed.reviewed_by.as_deref(), Some(admin.id.as_str()));
    assert!(reviewed.reviewed_at.is_some());

    // The submitter hears the outcome and the credit lands on their total.
    match alice_rx.try_recv().unwrap() {
        Notification::TaskReviewed { status, points, .. } => {
            assert_eq!(status, TaskStatus::Approved);
            assert_eq!(points, 50);
        }
        other => panic!("unexpected notification: {other:?}"),
    }
    let alice = engine.store().user_by_id(&alice.id).unwrap().unwrap();
    assert_eq!(alice.total_points, 50);
}

#[test]
fn assigned_task_walks_the_full_path() {
    let app = TestApp::new();
    let registry = Arc::new(ConnectionRegistry::new());
    let mut engine = app.engine_with(registry.clone());

    let bob = app.register(&engine, "bob", Role::User);
    let admin = app.register(&engine, "root", Role::Admin);

    let (bob_tx, bob_rx) = mpsc::channel();
    registry.register(bob.id.clone(), bob_tx);

    let deadline = Utc::now() + Duration::days(7);
    let task = engine
        .assign_task(
            &admin,
            AssignTask {
                assignee: "bob".to_string(),
                title: "Fix the login bug".to_string(),
                description: "Repro attached".to_string(),
                task_type: TaskType::BugReport,
                points: Some(60),
                deadline,
            },
        )
        .unwrap();
    assert_eq!(task.status, TaskStatus::Assigned);
    assert_eq!(task.points, 60);
    assert!(task.submitted_by.is_none());
    assert_eq!(task.assigned_to.as_deref(), Some(bob.id.as_str()));
    assert_eq!(task.assigned_by.as_deref(), Some(admin.id.as_str()));

    assert!(matches!(
        bob_rx.try_recv().unwrap(),
        Notification::TaskAssigned { .. }
    ));

    let task = engine.start_task(&bob, &task.id).unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);

    let task = engine.complete_task(&bob, &task.id, None).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.completed_at.is_some());

    // Award goes to the assignee on the assignment path.
    let reviewed = engine.review_task(&admin, approve(&task.id, None)).unwrap();
    assert_eq!(reviewed.awarded_points, Some(60));
    let bob = engine.store().user_by_id(&bob.id).unwrap().unwrap();
    assert_eq!(bob.total_points, 60);
}

#[test]
fn completion_straight_from_assigned_is_allowed() {
    let app = TestApp::new();
    let engine = app.engine();

    let bob = app.register(&engine, "bob", Role::User);
    let admin = app.register(&engine, "root", Role::Admin);

    let task = engine
        .assign_task(
            &admin,
            AssignTask {
                assignee: "bob".to_string(),
                title: "Skip the start step".to_string(),
                description: "straight to done".to_string(),
                task_type: TaskType::CommunityHelp,
                points: None,
                deadline: Utc::now() + Duration::days(1),
            },
        )
        .unwrap();

    let task = engine.complete_task(&bob, &task.id, None).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
}

#[test]
fn rejection_requires_a_reason_and_awards_nothing() {
    let app = TestApp::new();
    let mut engine = app.engine();

    let alice = app.register(&engine, "alice", Role::User);
    let admin = app.register(&engine, "root", Role::Admin);

    let task = engine
        .submit_task(&alice, submit_request("Half-done docs", TaskType::Documentation))
        .unwrap();

    let err = engine
        .review_task(&admin, reject(&task.id, None))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    let err = engine
        .review_task(&admin, reject(&task.id, Some("   ")))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let reviewed = engine
        .review_task(&admin, reject(&task.id, Some("needs screenshots")))
        .unwrap();
    assert_eq!(reviewed.status, TaskStatus::Rejected);
    assert_eq!(reviewed.awarded_points, Some(0));
    assert_eq!(reviewed.rejection_reason.as_deref(), Some("needs screenshots"));

    let alice = engine.store().user_by_id(&alice.id).unwrap().unwrap();
    assert_eq!(alice.total_points, 0);
}

#[test]
fn terminal_tasks_cannot_be_reviewed_again() {
    let app = TestApp::new();
    let mut engine = app.engine();

    let alice = app.register(&engine, "alice", Role::User);
    let admin = app.register(&engine, "root", Role::Admin);

    let task = engine
        .submit_task(&alice, submit_request("One-shot award", TaskType::FeatureRequest))
        .unwrap();
    engine.review_task(&admin, approve(&task.id, None)).unwrap();

    // A second review of either kind is an invalid-state error and the
    // total stays where the first review put it.
    let err = engine
        .review_task(&admin, approve(&task.id, Some(999)))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState { status: TaskStatus::Approved, .. }
    ));
    let err = engine
        .review_task(&admin, reject(&task.id, Some("too late")))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));

    let alice = engine.store().user_by_id(&alice.id).unwrap().unwrap();
    assert_eq!(alice.total_points, 30);
}

#[test]
fn review_is_admin_only() {
    let app = TestApp::new();
    let mut engine = app.engine();

    let alice = app.register(&engine, "alice", Role::User);
    let mallory = app.register(&engine, "mallory", Role::User);

    let task = engine
        .submit_task(&alice, submit_request("Tempting target", TaskType::BugReport))
        .unwrap();

    let err = engine
        .review_task(&mallory, approve(&task.id, None))
        .unwrap_err();
    assert!(matches!(err, Error::AdminRequired(_)));

    let err = engine.pending_tasks(&mallory).unwrap_err();
    assert!(matches!(err, Error::AdminRequired(_)));

    let err = engine.admin_stats(&mallory).unwrap_err();
    assert!(matches!(err, Error::AdminRequired(_)));
}

#[test]
fn assignment_is_admin_only_and_needs_a_real_assignee() {
    let app = TestApp::new();
    let engine = app.engine();

    let alice = app.register(&engine, "alice", Role::User);
    let admin = app.register(&engine, "root", Role::Admin);

    let request = AssignTask {
        assignee: "alice".to_string(),
        title: "A chore".to_string(),
        description: "do it".to_string(),
        task_type: TaskType::CommunityHelp,
        points: None,
        deadline: Utc::now() + Duration::days(3),
    };

    let err = engine.assign_task(&alice, request.clone()).unwrap_err();
    assert!(matches!(err, Error::AdminRequired(_)));

    let mut missing = request.clone();
    missing.assignee = "nobody".to_string();
    let err = engine.assign_task(&admin, missing).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let mut negative = request;
    negative.points = Some(-5);
    let err = engine.assign_task(&admin, negative).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn only_the_assignee_can_move_an_assigned_task() {
    let app = TestApp::new();
    let engine = app.engine();

    let bob = app.register(&engine, "bob", Role::User);
    let eve = app.register(&engine, "eve", Role::User);
    let admin = app.register(&engine, "root", Role::Admin);

    let task = engine
        .assign_task(
            &admin,
            AssignTask {
                assignee: "bob".to_string(),
                title: "Private work".to_string(),
                description: "bob's".to_string(),
                task_type: TaskType::BugReport,
                points: None,
                deadline: Utc::now() + Duration::days(1),
            },
        )
        .unwrap();

    // Someone else's task reads as not found, not as forbidden.
    let err = engine.start_task(&eve, &task.id).unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));
    let err = engine.complete_task(&eve, &task.id, None).unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));
    let err = engine.task(&eve, &task.id).unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));

    // Participants and admins can read it.
    assert!(engine.task(&bob, &task.id).is_ok());
    assert!(engine.task(&admin, &task.id).is_ok());
}

#[test]
fn self_submitted_tasks_cannot_be_started_or_completed() {
    let app = TestApp::new();
    let engine = app.engine();

    let alice = app.register(&engine, "alice", Role::User);
    let task = engine
        .submit_task(&alice, submit_request("Already done", TaskType::Documentation))
        .unwrap();

    // No assignee, so the assignee-only operations have nothing to match.
    let err = engine.start_task(&alice, &task.id).unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));
    let err = engine.complete_task(&alice, &task.id, None).unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));
}

#[test]
fn completed_task_cannot_be_started() {
    let app = TestApp::new();
    let engine = app.engine();

    let bob = app.register(&engine, "bob", Role::User);
    let admin = app.register(&engine, "root", Role::Admin);

    let task = engine
        .assign_task(
            &admin,
            AssignTask {
                assignee: "bob".to_string(),
                title: "Quick one".to_string(),
                description: "done fast".to_string(),
                task_type: TaskType::CommunityHelp,
                points: None,
                deadline: Utc::now() + Duration::days(1),
            },
        )
        .unwrap();
    engine.complete_task(&bob, &task.id, None).unwrap();

    let err = engine.start_task(&bob, &task.id).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState { status: TaskStatus::Completed, .. }
    ));
    let err = engine.complete_task(&bob, &task.id, None).unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
}

#[test]
fn duplicate_usernames_are_rejected() {
    let app = TestApp::new();
    let engine = app.engine();

    app.register(&engine, "alice", Role::User);
    let err = engine
        .register_user(merit::user::NewUser {
            username: "alice".to_string(),
            password: "other".to_string(),
            role: Role::Admin,
        })
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateUsername(name) if name == "alice"));
}

#[test]
fn listings_are_scoped_to_the_caller() {
    let app = TestApp::new();
    let engine = app.engine();

    let alice = app.register(&engine, "alice", Role::User);
    let bob = app.register(&engine, "bob", Role::User);
    let admin = app.register(&engine, "root", Role::Admin);

    engine
        .submit_task(&alice, submit_request("Alice's task", TaskType::BugReport))
        .unwrap();
    engine
        .assign_task(
            &admin,
            AssignTask {
                assignee: "bob".to_string(),
                title: "Bob's task".to_string(),
                description: "for bob".to_string(),
                task_type: TaskType::Documentation,
                points: None,
                deadline: Utc::now() + Duration::days(2),
            },
        )
        .unwrap();

    assert_eq!(engine.my_tasks(&alice).unwrap().len(), 1);
    assert_eq!(engine.my_tasks(&bob).unwrap().len(), 0);
    assert_eq!(engine.assigned_tasks(&bob).unwrap().len(), 1);
    assert_eq!(engine.assigned_tasks(&alice).unwrap().len(), 0);

    // Pending covers the self-submitted path only; assigned tasks are not
    // awaiting review yet.
    let pending = engine.pending_tasks(&admin).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].title, "Alice's task");
}
