//! Cluster color assignment.
//!
//! Color is a pure function of a cluster's ordinal position in the fetched ordering,
//! never of its identifier. Past `PALETTE.len()` clusters the colors repeat.

use signalgraph_common::PaletteColor;

pub const PALETTE: [PaletteColor; 8] = [
    PaletteColor {
        name: "cyan",
        fill: "#06b6d4",
        border: "#0891b2",
        glow: "rgba(6, 182, 212, 0.35)",
    },
    PaletteColor {
        name: "violet",
        fill: "#8b5cf6",
        border: "#7c3aed",
        glow: "rgba(139, 92, 246, 0.35)",
    },
    PaletteColor {
        name: "amber",
        fill: "#f59e0b",
        border: "#d97706",
        glow: "rgba(245, 158, 11, 0.35)",
    },
    PaletteColor {
        name: "emerald",
        fill: "#10b981",
        border: "#059669",
        glow: "rgba(16, 185, 129, 0.35)",
    },
    PaletteColor {
        name: "rose",
        fill: "#f43f5e",
        border: "#e11d48",
        glow: "rgba(244, 63, 94, 0.35)",
    },
    PaletteColor {
        name: "sky",
        fill: "#0ea5e9",
        border: "#0284c7",
        glow: "rgba(14, 165, 233, 0.35)",
    },
    PaletteColor {
        name: "orange",
        fill: "#f97316",
        border: "#ea580c",
        glow: "rgba(249, 115, 22, 0.35)",
    },
    PaletteColor {
        name: "fuchsia",
        fill: "#d946ef",
        border: "#c026d3",
        glow: "rgba(217, 70, 239, 0.35)",
    },
];

pub fn color_for(index: usize) -> PaletteColor {
    PALETTE[index % PALETTE.len()]
}
