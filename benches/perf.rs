use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use slipwise::atomic::{DecomposeOptions, MatchProfile, decompose_match};
use slipwise::entry::NormalizedEntryRecord;
use slipwise::kelly::{KellyState, solve_kelly_fraction};
use slipwise::portfolio::combine_atomic_match_profiles;
use slipwise::parse_natural_input;
use slipwise::team_alias::{AliasDictionary, curated_profiles};

const SLIP_TEXT: &str = "伯恩茅斯胜/平曼联 阿森纳 vs 切尔西 大2.5 2-1 皇马负巴萨 \
                         conf 70 odds 1.6 7.5 3.1 fse 0.8 0.5 tys S M fid 0.6 2串1";

fn sample_profiles(n: usize) -> Vec<MatchProfile> {
    let texts = [("胜", 1.9), ("平", 3.4), ("负", 4.2), ("2-1", 8.0)];
    (0..n)
        .map(|i| {
            let entries: Vec<NormalizedEntryRecord> = texts
                .iter()
                .take(2 + i % 3)
                .enumerate()
                .filter_map(|(j, (text, odds))| {
                    NormalizedEntryRecord::from_text(j.to_string(), text, *odds)
                })
                .collect();
            decompose_match(&entries, &DecomposeOptions::default())
        })
        .collect()
}

fn bench_parse(c: &mut Criterion) {
    let dict = AliasDictionary::from_sources(&curated_profiles(), &[]);
    c.bench_function("parse_natural_input", |b| {
        b.iter(|| parse_natural_input(black_box(SLIP_TEXT), black_box(&dict)))
    });
}

fn bench_combine(c: &mut Criterion) {
    let profiles = sample_profiles(6);
    c.bench_function("combine_6_profiles", |b| {
        b.iter(|| combine_atomic_match_profiles(black_box(&profiles)))
    });
}

fn bench_kelly(c: &mut Criterion) {
    let portfolio = combine_atomic_match_profiles(&sample_profiles(4));
    let states = KellyState::from_outcomes(&portfolio.states);
    c.bench_function("solve_kelly_fraction", |b| {
        b.iter(|| solve_kelly_fraction(black_box(&states), black_box(0.95)))
    });
}

criterion_group!(benches, bench_parse, bench_combine, bench_kelly);
criterion_main!(benches);
