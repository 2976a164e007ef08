/// The fixed stage graph, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Trim,
    RegionEffects,
    SilenceRemoval,
    SceneDetect,
    CutCompile,
    ColorPan,
    FinalRender,
}

impl StageKind {
    pub const ALL: [StageKind; 7] = [
        StageKind::Trim,
        StageKind::RegionEffects,
        StageKind::SilenceRemoval,
        StageKind::SceneDetect,
        StageKind::CutCompile,
        StageKind::ColorPan,
        StageKind::FinalRender,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Trim => "trim",
            StageKind::RegionEffects => "region_effects",
            StageKind::SilenceRemoval => "silence_removal",
            StageKind::SceneDetect => "scene_detect",
            StageKind::CutCompile => "cut_compile",
            StageKind::ColorPan => "color_pan",
            StageKind::FinalRender => "final_render",
        }
    }

    /// Position in [`StageKind::ALL`].
    pub fn index(self) -> usize {
        StageKind::ALL
            .iter()
            .position(|s| *s == self)
            .unwrap_or_default()
    }

    /// Critical stages run to completion even under resource pressure.
    pub fn is_critical(self) -> bool {
        matches!(self, StageKind::FinalRender)
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/stage.rs"]
mod tests;
