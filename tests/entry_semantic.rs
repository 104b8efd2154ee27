use slipwise::entry::{
    EntryDetail, MarketType, ResultOutcome, TotalSide, get_primary_entry_market,
    parse_entry_semantic, scan_result_outcomes,
};

#[test]
fn score_entry() {
    let s = parse_entry_semantic("2-1");
    assert_eq!(s.market_type, MarketType::Score);
    assert_eq!(s.semantic_key, "2-1");
    assert_eq!(s.detail, EntryDetail::Score { home: 2, away: 1 });
    assert_eq!(parse_entry_semantic("0:3").semantic_key, "0-3");
    assert!(parse_entry_semantic("1:2").denotes_away_outcome());
}

#[test]
fn home_win_result_entry() {
    let s = parse_entry_semantic("主胜");
    assert_eq!(s.market_type, MarketType::Result);
    assert_eq!(s.semantic_key, "win");
    assert!(!s.denotes_away_outcome());
}

#[test]
fn over_total_entry() {
    let s = parse_entry_semantic("大2.5");
    assert_eq!(s.market_type, MarketType::Total);
    assert_eq!(s.semantic_key, "over:2.5");
    assert_eq!(
        s.detail,
        EntryDetail::Total {
            side: TotalSide::Over,
            line: 2.5
        }
    );
}

#[test]
fn full_width_input_is_normalized_first() {
    // Full-width digits and colon.
    assert_eq!(parse_entry_semantic("２：１").semantic_key, "2-1");
    assert_eq!(parse_entry_semantic("ＷＩＮ").semantic_key, "win");
}

#[test]
fn double_chance_spellings_agree() {
    for text in ["1X", "胜/平", "win or draw", "不败", "主不败"] {
        let s = parse_entry_semantic(text);
        assert_eq!(s.market_type, MarketType::Result, "{text}");
        assert_eq!(s.semantic_key, "win|draw", "{text}");
    }
    assert_eq!(parse_entry_semantic("X2").semantic_key, "draw|lose");
    assert_eq!(parse_entry_semantic("12").semantic_key, "win|lose");
}

#[test]
fn half_full_forms() {
    for text in ["胜-负", "胜负", "半全场 胜负", "HT/FT W-L", "win->lose"] {
        let s = parse_entry_semantic(text);
        assert_eq!(s.market_type, MarketType::HalfFull, "{text}");
        assert_eq!(s.semantic_key, "win-lose", "{text}");
    }
}

#[test]
fn handicap_lines_keep_sign() {
    let s = parse_entry_semantic("客+1.5");
    assert_eq!(s.market_type, MarketType::Handicap);
    assert_eq!(s.semantic_key, "lose:+1.5");
    assert!(s.denotes_away_outcome());
    assert_eq!(parse_entry_semantic("平 0").semantic_key, "draw:0");
}

#[test]
fn primary_market_is_most_frequent() {
    let entries: Vec<_> = ["2-1", "1-1", "胜", "3-0"]
        .iter()
        .map(|t| parse_entry_semantic(t))
        .collect();
    assert_eq!(get_primary_entry_market(&entries), Some(MarketType::Score));
}

#[test]
fn result_outcome_scan() {
    assert_eq!(
        scan_result_outcomes("客不败"),
        Some(vec![ResultOutcome::Draw, ResultOutcome::Lose])
    );
    assert_eq!(scan_result_outcomes("大2.5"), None);
}
