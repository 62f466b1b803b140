//! Write a pair of sample inputs for `filter-top-customers`: a complaint
//! detail table and a ranked top-customer table derived from it.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;

const STATIONS: [&str; 4] = ["北区一部", "北区二部", "南区中心", "西区营业部"];
const CATEGORIES: [&str; 4] = ["签收延误", "派送延误", "破损", "丢件"];
const CUSTOMERS: [(&str, &str); 6] = [
    ("K1001", "华星电子"),
    ("K1002", "青禾食品"),
    ("K1003", "远航服饰"),
    ("K1004", "新程家居"),
    ("K1005", "云杉图书"),
    ("K1006", "明川五金"),
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    /// Skewed pick so a few customers dominate the complaint count.
    fn pick_skewed(&mut self, len: usize) -> usize {
        let a = (self.next_u64() % len as u64) as usize;
        let b = (self.next_u64() % len as u64) as usize;
        a.min(b)
    }

    fn pick(&mut self, len: usize) -> usize {
        (self.next_u64() % len as u64) as usize
    }
}

fn main() -> anyhow::Result<()> {
    let out_dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| ".".into());
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let mut counts: HashMap<(&str, &str, &str), usize> = HashMap::new();

    let detail_path = out_dir.join("sample_complaints.csv");
    let mut detail = csv::Writer::from_path(&detail_path)
        .with_context(|| format!("failed to create {}", detail_path.display()))?;
    detail.write_record(["单号", "工单小类", "揽收网点名称", "K码", "客户名称"])?;

    let rows = 200u64;
    for i in 0..rows {
        let station = STATIONS[rng.pick(STATIONS.len())];
        let (k, customer) = CUSTOMERS[rng.pick_skewed(CUSTOMERS.len())];
        let category = CATEGORIES[rng.pick(CATEGORIES.len())];
        let tracking = (7_730_000_000_000u64 + i * 37).to_string();
        detail.write_record([tracking.as_str(), category, station, k, customer])?;
        *counts.entry((station, k, customer)).or_default() += 1;
    }
    detail.flush()?;

    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let lookup_path = out_dir.join("sample_top_customers.csv");
    let mut lookup = csv::Writer::from_path(&lookup_path)
        .with_context(|| format!("failed to create {}", lookup_path.display()))?;
    lookup.write_record(["揽收网点名称", "K码", "客户名称", "投诉量"])?;
    for ((station, k, customer), n) in &ranked {
        lookup.write_record([*station, *k, *customer, n.to_string().as_str()])?;
    }
    lookup.flush()?;

    println!(
        "Wrote {rows} complaints to {} and {} ranked customers to {}",
        detail_path.display(),
        ranked.len(),
        lookup_path.display()
    );
    Ok(())
}
