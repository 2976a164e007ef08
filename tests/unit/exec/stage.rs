use super::*;

#[test]
fn stages_run_in_a_fixed_order() {
    for (i, s) in StageKind::ALL.iter().enumerate() {
        assert_eq!(s.index(), i);
    }
    assert_eq!(StageKind::Trim.index(), 0);
    assert_eq!(StageKind::FinalRender.index(), 6);
}

#[test]
fn only_final_render_is_critical() {
    let critical: Vec<_> = StageKind::ALL.into_iter().filter(|s| s.is_critical()).collect();
    assert_eq!(critical, vec![StageKind::FinalRender]);
}

#[test]
fn names_match_serde() {
    for s in StageKind::ALL {
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, format!("\"{}\"", s.as_str()));
        assert_eq!(s.to_string(), s.as_str());
    }
}
