use serde::Deserialize;

// Only the fields we read from `/v8/finance/chart/{symbol}`.

#[derive(Debug, Clone, Deserialize)]
pub struct ChartEnvelope {
    pub chart: Chart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chart {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub previous_close: Option<f64>,
    pub regular_market_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartError {
    pub code: Option<String>,
    pub description: Option<String>,
}
