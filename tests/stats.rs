//! Leaderboard ranking and the stats projections.

mod support;

use chrono::{Duration, Utc};
use merit::engine::Engine;
use merit::stats;
use merit::task::{ReviewDecision, ReviewTask, SubmitTask, TaskType};
use merit::user::{Role, User};
use support::TestApp;

/// Put `points` on a user's total by submitting and approving one task with
/// an explicit award override.
fn credit(engine: &mut Engine, user: &User, admin: &User, points: i64) {
    let task = engine
        .submit_task(
            user,
            SubmitTask {
                title: format!("worth {points}"),
                description: "points fixture".to_string(),
                task_type: TaskType::CommunityHelp,
            },
        )
        .unwrap();
    engine
        .review_task(
            admin,
            ReviewTask {
                task_id: task.id,
                decision: ReviewDecision::Approved,
                awarded_points: Some(points),
                rejection_reason: None,
            },
        )
        .unwrap();
}

#[test]
fn equal_points_share_a_rank() {
    let app = TestApp::new();
    let mut engine = app.engine();

    let admin = app.register(&engine, "root", Role::Admin);
    let ada = app.register(&engine, "ada", Role::User);
    let bo = app.register(&engine, "bo", Role::User);
    let cy = app.register(&engine, "cy", Role::User);
    let di = app.register(&engine, "di", Role::User);

    credit(&mut engine, &ada, &admin, 100);
    credit(&mut engine, &bo, &admin, 50);
    credit(&mut engine, &cy, &admin, 50);
    credit(&mut engine, &di, &admin, 10);

    let rank_of = |user: &User| {
        let user = engine.store().user_by_id(&user.id).unwrap().unwrap();
        engine.user_stats(&user).unwrap().rank
    };

    assert_eq!(rank_of(&ada), 1);
    assert_eq!(rank_of(&bo), 2);
    assert_eq!(rank_of(&cy), 2);
    // Two users tied above still count individually.
    assert_eq!(rank_of(&di), 4);
}

#[test]
fn earning_points_never_lowers_a_users_rank() {
    let app = TestApp::new();
    let mut engine = app.engine();

    let admin = app.register(&engine, "root", Role::Admin);
    let ada = app.register(&engine, "ada", Role::User);
    let bo = app.register(&engine, "bo", Role::User);
    let cy = app.register(&engine, "cy", Role::User);

    credit(&mut engine, &bo, &admin, 100);
    credit(&mut engine, &cy, &admin, 60);
    credit(&mut engine, &ada, &admin, 10);

    let rank_of = |engine: &Engine, user: &User| {
        let user = engine.store().user_by_id(&user.id).unwrap().unwrap();
        engine.user_stats(&user).unwrap().rank
    };

    // Each further award moves ada's rank up or leaves it alone, never down.
    let mut previous = rank_of(&engine, &ada);
    assert_eq!(previous, 3);
    for award in [55, 50, 100] {
        credit(&mut engine, &ada, &admin, award);
        let current = rank_of(&engine, &ada);
        assert!(
            current <= previous,
            "rank went from {previous} to {current} after earning {award} points"
        );
        previous = current;
    }
    assert_eq!(previous, 1);

    // The bystanders' totals were untouched along the way.
    assert_eq!(
        engine.store().user_by_id(&bo.id).unwrap().unwrap().total_points,
        100
    );
    assert_eq!(
        engine.store().user_by_id(&cy.id).unwrap().unwrap().total_points,
        60
    );
}

#[test]
fn leaderboard_orders_excludes_admins_and_honors_limit() {
    let app = TestApp::new();
    let mut engine = app.engine();

    let admin = app.register(&engine, "root", Role::Admin);
    let ada = app.register(&engine, "ada", Role::User);
    let bo = app.register(&engine, "bo", Role::User);
    let cy = app.register(&engine, "cy", Role::User);

    credit(&mut engine, &ada, &admin, 10);
    credit(&mut engine, &bo, &admin, 80);
    credit(&mut engine, &cy, &admin, 30);

    let entries = engine.leaderboard(None).unwrap();
    let names: Vec<&str> = entries.iter().map(|entry| entry.username.as_str()).collect();
    assert_eq!(names, ["bo", "cy", "ada"]);
    assert_eq!(entries[0].total_points, 80);
    assert_eq!(entries[0].rank, 1);

    let top_two = engine.leaderboard(Some(2)).unwrap();
    assert_eq!(top_two.len(), 2);
    assert_eq!(top_two[1].username, "cy");
}

#[test]
fn user_stats_count_own_tasks() {
    let app = TestApp::new();
    let mut engine = app.engine();

    let admin = app.register(&engine, "root", Role::Admin);
    let ada = app.register(&engine, "ada", Role::User);

    credit(&mut engine, &ada, &admin, 40);
    engine
        .submit_task(
            &ada,
            SubmitTask {
                title: "Still waiting".to_string(),
                description: "pending".to_string(),
                task_type: TaskType::BugReport,
            },
        )
        .unwrap();

    let ada = engine.store().user_by_id(&ada.id).unwrap().unwrap();
    let stats = engine.user_stats(&ada).unwrap();
    assert_eq!(stats.total_points, 40);
    assert_eq!(stats.completed_tasks, 1);
    assert_eq!(stats.pending_tasks, 1);
    assert_eq!(stats.rank, 1);
}

#[test]
fn admin_stats_reflect_reviews_and_population() {
    let app = TestApp::new();
    let mut engine = app.engine();

    let admin = app.register(&engine, "root", Role::Admin);
    let ada = app.register(&engine, "ada", Role::User);
    let bo = app.register(&engine, "bo", Role::User);

    credit(&mut engine, &ada, &admin, 50);
    credit(&mut engine, &bo, &admin, 20);
    engine
        .submit_task(
            &ada,
            SubmitTask {
                title: "Unreviewed".to_string(),
                description: "pending".to_string(),
                task_type: TaskType::Documentation,
            },
        )
        .unwrap();

    let stats = engine.admin_stats(&admin).unwrap();
    assert_eq!(stats.pending_tasks, 1);
    assert_eq!(stats.approved_today, 2);
    assert_eq!(stats.points_distributed, 70);
    // Admin accounts are not counted as active users.
    assert_eq!(stats.active_users, 2);
}

#[test]
fn approved_today_uses_the_calendar_day() {
    let app = TestApp::new();
    let mut engine = app.engine();

    let admin = app.register(&engine, "root", Role::Admin);
    let ada = app.register(&engine, "ada", Role::User);
    credit(&mut engine, &ada, &admin, 10);

    let today = stats::approved_today(engine.store(), Utc::now()).unwrap();
    assert_eq!(today, 1);

    // The same approval does not count toward another day.
    let next_week = stats::approved_today(engine.store(), Utc::now() + Duration::days(7)).unwrap();
    assert_eq!(next_week, 0);
}

#[test]
fn empty_system_has_empty_projections() {
    let app = TestApp::new();
    let engine = app.engine();
    let admin = app.register(&engine, "root", Role::Admin);

    assert!(engine.leaderboard(None).unwrap().is_empty());

    let stats = engine.admin_stats(&admin).unwrap();
    assert_eq!(stats.pending_tasks, 0);
    assert_eq!(stats.approved_today, 0);
    assert_eq!(stats.points_distributed, 0);
    assert_eq!(stats.active_users, 0);
}
