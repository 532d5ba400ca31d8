//! Initial operation picture.
//!
//! Active assignments point both ways. A rescued victim keeps the team that
//! brought it out, while that team is free again.

use chrono::{DateTime, Duration, Utc};

use crate::alerts::{AlertFeed, AlertSeverity};
use crate::models::{
    Breathing, Drone, DroneStatus, Hazard, HazardKind, HazardSeverity, Point, Rect, RescueStatus,
    RescueTeam, SafeZone, TeamStatus, Victim, VictimStatus, Vitals,
};
use crate::store::EntityStore;
use crate::timeline::{EventCategory, EventTimeline, TimelineEvent};

struct VictimSeed {
    id: &'static str,
    at: (f64, f64),
    sector: &'static str,
    status: VictimStatus,
    condition: &'static str,
    confidence: f64,
    rescue: RescueStatus,
    priority: u8,
    minutes_ago: i64,
    vitals: (f64, Breathing),
    team: Option<&'static str>,
}

const VICTIMS: [VictimSeed; 5] = [
    VictimSeed {
        id: "V-001",
        at: (25.0, 30.0),
        sector: "Sector A7",
        status: VictimStatus::Critical,
        condition: "Unconscious",
        confidence: 94.0,
        rescue: RescueStatus::Pending,
        priority: 1,
        minutes_ago: 3,
        vitals: (45.0, Breathing::Weak),
        team: None,
    },
    VictimSeed {
        id: "V-002",
        at: (45.0, 60.0),
        sector: "Sector B3",
        status: VictimStatus::Injured,
        condition: "Conscious, Trapped",
        confidence: 87.0,
        rescue: RescueStatus::Pending,
        priority: 2,
        minutes_ago: 8,
        vitals: (78.0, Breathing::Stable),
        team: None,
    },
    VictimSeed {
        id: "V-003",
        at: (70.0, 40.0),
        sector: "Sector C1",
        status: VictimStatus::Deceased,
        condition: "No Vital Signs",
        confidence: 91.0,
        rescue: RescueStatus::ConfirmedSafe,
        priority: 3,
        minutes_ago: 15,
        vitals: (0.0, Breathing::None),
        team: None,
    },
    VictimSeed {
        id: "V-004",
        at: (15.0, 70.0),
        sector: "Sector A9",
        status: VictimStatus::Critical,
        condition: "Weak Vitals",
        confidence: 89.0,
        rescue: RescueStatus::InProgress,
        priority: 1,
        minutes_ago: 1,
        vitals: (52.0, Breathing::Irregular),
        team: Some("RT-Beta"),
    },
    VictimSeed {
        id: "V-005",
        at: (12.0, 90.0),
        sector: "Sector D2",
        status: VictimStatus::Stable,
        condition: "Minor Injuries",
        confidence: 76.0,
        rescue: RescueStatus::Rescued,
        priority: 4,
        minutes_ago: 22,
        vitals: (82.0, Breathing::Normal),
        team: Some("RT-Alpha"),
    },
];

fn drones() -> Vec<Drone> {
    vec![
        Drone::new("D-001", 87.0, 95.0, 120.0, 15.0, Point::new(30.0, 35.0)),
        Drone::new("D-002", 62.0, 88.0, 85.0, 12.0, Point::new(50.0, 50.0)),
        Drone::new("D-003", 8.0, 45.0, 50.0, 8.0, Point::new(65.0, 45.0)),
        Drone::new("D-004", 0.0, 0.0, 0.0, 0.0, Point::new(55.0, 80.0)),
        Drone::new("D-005", 94.0, 92.0, 150.0, 18.0, Point::new(20.0, 65.0)),
        Drone::new("D-006", 76.0, 89.0, 110.0, 14.0, Point::new(40.0, 20.0)),
        Drone::new("D-007", 45.0, 0.0, 0.0, 0.0, Point::new(10.0, 88.0))
            .with_status(DroneStatus::Charging),
    ]
}

struct TeamSeed {
    id: &'static str,
    members: u32,
    location: &'static str,
    at: (f64, f64),
    status: TeamStatus,
    victim: Option<&'static str>,
    eta_secs: Option<u32>,
    /// Last radio message and how long ago it came in
    radio: (&'static str, i64),
}

const TEAMS: [TeamSeed; 3] = [
    TeamSeed {
        id: "RT-Alpha",
        members: 4,
        location: "Base Camp",
        at: (10.0, 80.0),
        status: TeamStatus::Available,
        victim: None,
        eta_secs: None,
        radio: ("Standing by for assignment", 120),
    },
    TeamSeed {
        id: "RT-Beta",
        members: 3,
        location: "Sector B3",
        at: (85.0, 15.0),
        status: TeamStatus::EnRoute,
        victim: Some("V-004"),
        eta_secs: Some(240),
        radio: ("Approaching victim location", 30),
    },
    TeamSeed {
        id: "RT-Charlie",
        members: 5,
        location: "Sector A7",
        at: (25.0, 32.0),
        status: TeamStatus::Available,
        victim: None,
        eta_secs: None,
        radio: ("Holding position in sector", 60),
    },
];

fn teams(now: DateTime<Utc>) -> Vec<RescueTeam> {
    TEAMS
        .iter()
        .map(|seed| {
            let (message, secs_ago) = seed.radio;
            let mut team = RescueTeam {
                id: seed.id.into(),
                members: seed.members,
                location: seed.location.into(),
                position: Point::new(seed.at.0, seed.at.1),
                status: seed.status,
                assigned_victim: seed.victim.map(String::from),
                eta_secs: seed.eta_secs,
                last_update: now,
                communications: Vec::new(),
            };
            team.log(now - Duration::seconds(secs_ago), message);
            team
        })
        .collect()
}

/// Seeded entity collections. Detection times are relative to `now`.
pub fn entities(now: DateTime<Utc>) -> EntityStore {
    let mut store = EntityStore::new();
    for drone in drones() {
        store.insert(drone);
    }
    for seed in &VICTIMS {
        store.insert(Victim {
            id: seed.id.into(),
            location: seed.sector.into(),
            status: seed.status,
            condition: seed.condition.into(),
            confidence: seed.confidence,
            rescue_status: seed.rescue,
            priority: seed.priority,
            vitals: Vitals {
                heart_rate: seed.vitals.0,
                breathing: seed.vitals.1,
            },
            assigned_team: seed.team.map(String::from),
            detected_at: now - Duration::minutes(seed.minutes_ago),
            position: Point::new(seed.at.0, seed.at.1),
        });
    }
    for (id, at, kind, severity) in [
        ("H-001", (35.0, 25.0), HazardKind::Fire, HazardSeverity::High),
        ("H-002", (60.0, 70.0), HazardKind::Flood, HazardSeverity::Medium),
        ("H-003", (80.0, 30.0), HazardKind::Collapse, HazardSeverity::High),
    ] {
        store.insert(Hazard {
            id: id.into(),
            position: Point::new(at.0, at.1),
            kind,
            severity,
        });
    }
    for team in teams(now) {
        store.insert(team);
    }
    for (id, area) in [
        ("SZ-001", Rect { x: 5.0, y: 85.0, width: 15.0, height: 12.0 }),
        ("SZ-002", Rect { x: 80.0, y: 5.0, width: 18.0, height: 15.0 }),
    ] {
        store.insert(SafeZone { id: id.into(), area });
    }
    store
}

/// Seed alerts, raised oldest first so the newest reads first.
pub fn alerts(feed: &mut AlertFeed, now: DateTime<Utc>) {
    let seeds = [
        (AlertSeverity::Important, "Weather Alert: High Winds Detected", 18),
        (AlertSeverity::Critical, "Communication Lost with D-004", 15),
        (AlertSeverity::Info, "Rescue Team Alpha En Route", 12),
        (AlertSeverity::Important, "New Victim Detected - Sector A7", 5),
        (AlertSeverity::Critical, "Drone D-003 Battery Critical (8%)", 2),
    ];
    for (severity, message, minutes_ago) in seeds {
        feed.raise(severity, message, now - Duration::minutes(minutes_ago));
    }
}

pub fn timeline(timeline: &mut EventTimeline) {
    let seeds = [
        ("14:32", "Mission Started", EventCategory::Start),
        ("14:35", "First Victim Detected", EventCategory::Detection),
        ("14:41", "RT-Alpha Deployed", EventCategory::Deployment),
        ("14:47", "First Rescue Completed", EventCategory::Rescue),
        ("14:52", "Hazard Area Identified", EventCategory::Hazard),
        ("14:58", "RT-Beta Deployed", EventCategory::Deployment),
    ];
    for (time, description, category) in seeds {
        timeline.append(TimelineEvent::new(time, description, category));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_references_point_both_ways() {
        let store = entities(Utc::now());
        for victim in store.victims() {
            if let Some(team) = store.team_for_victim(&victim.id) {
                if team.assigned_victim.is_some() {
                    assert_eq!(team.assigned_victim.as_deref(), Some(victim.id.as_str()));
                }
            }
        }
        for team in store.teams() {
            if let Some(victim) = store.victim_for_team(&team.id) {
                assert_eq!(victim.assigned_team.as_deref(), Some(team.id.as_str()));
            }
        }
    }

    #[test]
    fn seeded_drone_states() {
        let store = entities(Utc::now());
        let status = |id: &str| store.find::<Drone>(id).map(Drone::status);
        assert_eq!(status("D-003"), Some(DroneStatus::LowBattery));
        assert_eq!(status("D-004"), Some(DroneStatus::Offline));
        assert_eq!(status("D-007"), Some(DroneStatus::Charging));
        assert_eq!(store.drones().len(), 7);
    }

    #[test]
    fn seeded_teams_carry_their_last_radio_message() {
        let now = Utc::now();
        let store = entities(now);
        let beta = store.find::<RescueTeam>("RT-Beta").unwrap();
        assert_eq!(beta.communications.len(), 1);
        assert_eq!(beta.communications[0].message, "Approaching victim location");
        assert_eq!(beta.last_update, now - Duration::seconds(30));
        for team in store.teams() {
            assert_eq!(team.communications.last().map(|m| m.time), Some(team.last_update));
        }
    }

    #[test]
    fn seed_alerts_read_newest_first() {
        let mut feed = AlertFeed::new(3, 64);
        alerts(&mut feed, Utc::now());
        let page = feed.current_page();
        assert_eq!(page.alerts[0].message, "Drone D-003 Battery Critical (8%)");
        assert_eq!(page.page_count, 2);
    }
}
