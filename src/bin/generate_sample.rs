use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;

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
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.below(items.len() as u64) as usize]
    }
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let services = ["INTERNET", "COMBO", "TV"];
    let responsables = ["Ana", "Luis", "Marta"];
    let errors = ["TARIFA", "ALTA NO FACTURADA", "PLAN INCORRECTO"];
    let rates = [120.0, 180.0, 250.0, 340.0];

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).context("epoch")?;
    let start = NaiveDate::from_ymd_opt(2024, 1, 8).context("start date")?;
    let start_day = (start - epoch).num_days() as i32;

    let mut contract = Vec::new();
    let mut sent = Vec::new();
    let mut reviewed = Vec::new();
    let mut service = Vec::new();
    let mut status = Vec::new();
    let mut owner = Vec::new();
    let mut error = Vec::new();
    let mut rate = Vec::new();
    let mut recovered = Vec::new();
    let mut unrecovered = Vec::new();
    let mut periods = Vec::new();
    let mut delay = Vec::new();

    for i in 0..240 {
        let sent_day = start_day + rng.below(60) as i32;
        let delay_days = 1 + rng.below(20) as i64;
        let plan = rates[rng.below(rates.len() as u64) as usize];
        let unbilled = 1 + rng.below(6) as i64;
        let owed = plan * unbilled as f64;
        let resolved = rng.next_f64() < 0.6;
        let got = if resolved { (owed * (0.5 + rng.next_f64() / 2.0)).round() } else { 0.0 };

        contract.push(format!("C-{:05}", 10_000 + i));
        sent.push(sent_day);
        reviewed.push(resolved.then_some(sent_day + delay_days as i32));
        service.push(rng.pick(&services));
        status.push(if resolved { "RESUELTO" } else { "PENDIENTE" });
        owner.push(rng.pick(&responsables));
        error.push(rng.pick(&errors));
        rate.push(plan);
        recovered.push(got);
        unrecovered.push(owed - got);
        periods.push(unbilled);
        delay.push(delay_days);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("CONTRATO", DataType::Utf8, false),
        Field::new("FECHA ENVIO", DataType::Date32, false),
        Field::new("FECHA DE REVISION", DataType::Date32, true),
        Field::new("TIPO DE SERVICIO", DataType::Utf8, false),
        Field::new("ESTADO", DataType::Utf8, false),
        Field::new("RESPONSABLE", DataType::Utf8, false),
        Field::new("TIPO DE ERROR", DataType::Utf8, false),
        Field::new("TARIFA PLAN", DataType::Float64, false),
        Field::new("MONTO RECUPERADO", DataType::Float64, false),
        Field::new("MONTO NO RECUPERADO", DataType::Float64, false),
        Field::new("PERIODOS NO FACTURADO", DataType::Int64, false),
        Field::new("DIAS DE DEMORA", DataType::Int64, false),
    ]));

    let rows = contract.len();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(contract)),
            Arc::new(Date32Array::from(sent)),
            Arc::new(Date32Array::from(reviewed)),
            Arc::new(StringArray::from(service)),
            Arc::new(StringArray::from(status)),
            Arc::new(StringArray::from(owner)),
            Arc::new(StringArray::from(error)),
            Arc::new(Float64Array::from(rate)),
            Arc::new(Float64Array::from(recovered)),
            Arc::new(Float64Array::from(unrecovered)),
            Arc::new(Int64Array::from(periods)),
            Arc::new(Int64Array::from(delay)),
        ],
    )
    .context("building record batch")?;

    // Write Parquet
    let output_path = "sample_cases.parquet";
    let file = std::fs::File::create(output_path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;

    println!("Wrote {rows} cases to {output_path}");
    Ok(())
}
