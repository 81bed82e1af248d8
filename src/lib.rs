// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! LMS progress service: lesson progress, XP and levels, daily streaks,
//! course certificates, and the weekly leaderboard.
//!
//! This crate provides the backend API that the learning platform calls
//! when a learner watches or completes a lesson.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;
pub mod validation;

use config::Config;
use db::{Gateway, LearningStore};
use services::{
    BillingService, CertificateIssuer, LeaderboardService, LearningService, ProgressTracker,
    StreakEngine, XpLedger,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub gateway: Gateway,
    pub progress: ProgressTracker,
    pub streaks: StreakEngine,
    pub certificates: CertificateIssuer,
    pub leaderboard: LeaderboardService,
    pub learning: LearningService,
    pub billing: BillingService,
}

impl AppState {
    /// Wire every service to one store.
    pub fn new(config: Config, store: Arc<dyn LearningStore>) -> Self {
        let gateway = Gateway::new(store, config.store_timeout);

        let xp = XpLedger::new(gateway.clone());
        let progress = ProgressTracker::new(gateway.clone(), config.lesson_xp);
        let streaks = StreakEngine::new(gateway.clone());
        let certificates =
            CertificateIssuer::new(gateway.clone(), xp, config.course_completion_xp);
        let leaderboard = LeaderboardService::new(gateway.clone(), config.leaderboard_cache_ttl);
        let learning = LearningService::new(
            gateway.clone(),
            progress.clone(),
            streaks.clone(),
            certificates.clone(),
        );
        let billing = BillingService::new(gateway.clone());

        Self {
            config,
            gateway,
            progress,
            streaks,
            certificates,
            leaderboard,
            learning,
            billing,
        }
    }
}
