//! Fixed table of chapters and modules, resolved by slug.

use crate::models::{ChapterEntry, ChapterLink, ModuleInfo};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Slug of the chapter the "Start Learning" links point at.
pub const FIRST_CHAPTER: &str = "introduction-to-physical-ai";

macro_rules! body {
    ($slug:literal) => {
        include_str!(concat!("../../content/chapters/", $slug, ".html"))
    };
}

const fn link(slug: &'static str, title: &'static str) -> Option<ChapterLink> {
    Some(ChapterLink { slug, title })
}

static CHAPTERS: [ChapterEntry; 15] = [
    ChapterEntry {
        slug: "introduction-to-physical-ai",
        title: "Introduction to Physical AI",
        chapter_id: "1.1",
        module_id: 1,
        body: body!("introduction-to-physical-ai"),
        prev: None,
        next: link("ros2-architecture", "ROS 2 Architecture"),
    },
    ChapterEntry {
        slug: "ros2-architecture",
        title: "ROS 2 Architecture",
        chapter_id: "1.2",
        module_id: 1,
        body: body!("ros2-architecture"),
        prev: link("introduction-to-physical-ai", "Introduction to Physical AI"),
        next: link("building-ros2-packages", "Building ROS 2 Packages"),
    },
    ChapterEntry {
        slug: "building-ros2-packages",
        title: "Building ROS 2 Packages",
        chapter_id: "1.3",
        module_id: 1,
        body: body!("building-ros2-packages"),
        prev: link("ros2-architecture", "ROS 2 Architecture"),
        next: link("urdf-for-humanoids", "URDF for Humanoids"),
    },
    ChapterEntry {
        slug: "urdf-for-humanoids",
        title: "URDF for Humanoids",
        chapter_id: "1.4",
        module_id: 1,
        body: body!("urdf-for-humanoids"),
        prev: link("building-ros2-packages", "Building ROS 2 Packages"),
        next: link("gazebo-simulation", "Gazebo Simulation"),
    },
    ChapterEntry {
        slug: "gazebo-simulation",
        title: "Gazebo Simulation Environment",
        chapter_id: "2.1",
        module_id: 2,
        body: body!("gazebo-simulation"),
        prev: link("urdf-for-humanoids", "URDF for Humanoids"),
        next: link("sensor-simulation", "Sensor Simulation"),
    },
    ChapterEntry {
        slug: "sensor-simulation",
        title: "Sensor Simulation",
        chapter_id: "2.2",
        module_id: 2,
        body: body!("sensor-simulation"),
        prev: link("gazebo-simulation", "Gazebo Simulation"),
        next: link("unity-for-robotics", "Unity for Robotics"),
    },
    ChapterEntry {
        slug: "unity-for-robotics",
        title: "Unity for Robot Visualization",
        chapter_id: "2.3",
        module_id: 2,
        body: body!("unity-for-robotics"),
        prev: link("sensor-simulation", "Sensor Simulation"),
        next: link("isaac-sim", "Isaac Sim"),
    },
    ChapterEntry {
        slug: "isaac-sim",
        title: "NVIDIA Isaac Sim",
        chapter_id: "3.1",
        module_id: 3,
        body: body!("isaac-sim"),
        prev: link("unity-for-robotics", "Unity for Robotics"),
        next: link("isaac-ros", "Isaac ROS"),
    },
    ChapterEntry {
        slug: "isaac-ros",
        title: "Isaac ROS",
        chapter_id: "3.2",
        module_id: 3,
        body: body!("isaac-ros"),
        prev: link("isaac-sim", "Isaac Sim"),
        next: link("navigation-nav2", "Navigation with Nav2"),
    },
    ChapterEntry {
        slug: "navigation-nav2",
        title: "Navigation with Nav2",
        chapter_id: "3.3",
        module_id: 3,
        body: body!("navigation-nav2"),
        prev: link("isaac-ros", "Isaac ROS"),
        next: link("sim-to-real", "Sim-to-Real Transfer"),
    },
    ChapterEntry {
        slug: "sim-to-real",
        title: "Sim-to-Real Transfer",
        chapter_id: "3.4",
        module_id: 3,
        body: body!("sim-to-real"),
        prev: link("navigation-nav2", "Navigation with Nav2"),
        next: link("voice-to-action", "Voice-to-Action"),
    },
    ChapterEntry {
        slug: "voice-to-action",
        title: "Voice-to-Action",
        chapter_id: "4.1",
        module_id: 4,
        body: body!("voice-to-action"),
        prev: link("sim-to-real", "Sim-to-Real Transfer"),
        next: link("cognitive-planning", "Cognitive Planning"),
    },
    ChapterEntry {
        slug: "cognitive-planning",
        title: "Cognitive Planning with LLMs",
        chapter_id: "4.2",
        module_id: 4,
        body: body!("cognitive-planning"),
        prev: link("voice-to-action", "Voice-to-Action"),
        next: link("multi-modal-interaction", "Multi-Modal Interaction"),
    },
    ChapterEntry {
        slug: "multi-modal-interaction",
        title: "Multi-Modal Interaction",
        chapter_id: "4.3",
        module_id: 4,
        body: body!("multi-modal-interaction"),
        prev: link("cognitive-planning", "Cognitive Planning"),
        next: link("capstone-project", "Capstone Project"),
    },
    ChapterEntry {
        slug: "capstone-project",
        title: "Capstone Project: The Autonomous Humanoid",
        chapter_id: "4.4",
        module_id: 4,
        body: body!("capstone-project"),
        prev: link("multi-modal-interaction", "Multi-Modal Interaction"),
        next: None,
    },
];

static MODULES: [ModuleInfo; 4] = [
    ModuleInfo {
        number: 1,
        title: "The Robotic Nervous System",
        subtitle: "ROS 2 Fundamentals",
        description: "Master the middleware for robot control with ROS 2 nodes, topics, services, and URDF.",
        chapters: &[
            "introduction-to-physical-ai",
            "ros2-architecture",
            "building-ros2-packages",
            "urdf-for-humanoids",
        ],
    },
    ModuleInfo {
        number: 2,
        title: "The Digital Twin",
        subtitle: "Gazebo & Unity",
        description: "Build physics simulations and high-fidelity environments for robot testing.",
        chapters: &["gazebo-simulation", "sensor-simulation", "unity-for-robotics"],
    },
    ModuleInfo {
        number: 3,
        title: "The AI-Robot Brain",
        subtitle: "NVIDIA Isaac Platform",
        description: "Advanced perception, VSLAM navigation, and synthetic data generation.",
        chapters: &["isaac-sim", "isaac-ros", "navigation-nav2", "sim-to-real"],
    },
    ModuleInfo {
        number: 4,
        title: "Vision-Language-Action",
        subtitle: "LLM + Robotics",
        description: "Voice commands, cognitive planning, and multi-modal human-robot interaction.",
        chapters: &[
            "voice-to-action",
            "cognitive-planning",
            "multi-modal-interaction",
            "capstone-project",
        ],
    },
];

static BY_SLUG: LazyLock<HashMap<&'static str, &'static ChapterEntry>> =
    LazyLock::new(|| CHAPTERS.iter().map(|entry| (entry.slug, entry)).collect());

/// Exact-match lookup; anything else is "not found".
pub fn resolve(slug: &str) -> Option<&'static ChapterEntry> {
    BY_SLUG.get(slug).copied()
}

/// All chapters in reading order.
pub fn chapters() -> &'static [ChapterEntry] {
    &CHAPTERS
}

pub fn modules() -> &'static [ModuleInfo] {
    &MODULES
}

pub fn module(number: u8) -> Option<&'static ModuleInfo> {
    MODULES.iter().find(|m| m.number == number)
}

/// Every slug the chapter route is generated for.
pub fn static_params() -> Vec<&'static str> {
    CHAPTERS.iter().map(|entry| entry.slug).collect()
}

/// Describes every prev/next or module reference that does not point at a
/// registered chapter. Empty when the table is consistent.
pub fn validate_links() -> Vec<String> {
    let mut broken = Vec::new();
    for entry in &CHAPTERS {
        for (label, link) in [("prev", entry.prev), ("next", entry.next)] {
            if let Some(link) = link {
                if resolve(link.slug).is_none() {
                    broken.push(format!("{} -> {} {}", entry.slug, label, link.slug));
                }
            }
        }
        if module(entry.module_id).is_none() {
            broken.push(format!("{} -> module {}", entry.slug, entry.module_id));
        }
    }
    for info in &MODULES {
        for slug in info.chapters {
            if resolve(slug).is_none() {
                broken.push(format!("module {} -> {}", info.number, slug));
            }
        }
    }
    broken
}
