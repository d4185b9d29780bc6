use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 识别结果里的叶子字段: 原样保留 AI 返回的值 (字符串或数字)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scalar(pub Value);

impl Scalar {
    /// 展示用文本; 对象/数组/空字符串视为缺失
    pub fn as_text(&self) -> Option<String> {
        match &self.0 {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// 金额解析, 无法解析时为 None
    pub fn parse(&self) -> Option<f64> {
        match &self.0 {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_float(s),
            _ => None,
        }
    }

    /// 汇总用金额, 非数字计为 0
    pub fn amount(&self) -> f64 {
        self.parse().unwrap_or(0.0)
    }

    /// 与 JSON 真值语义一致: 0 / "" / false / null 为假
    pub fn is_truthy(&self) -> bool {
        match &self.0 {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(true),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

/// 解析字符串开头的十进制数字前缀 ("12.5 USD" -> 12.5), 无数字时返回 None
pub fn parse_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut digits = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }

    // 指数部分必须完整才计入
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    #[serde(default)]
    pub name: Option<Scalar>,
    #[serde(default)]
    pub address: Option<Scalar>,
    #[serde(default)]
    pub phone: Option<Scalar>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub date: Option<Scalar>,
    #[serde(default)]
    pub time: Option<Scalar>,
    #[serde(default)]
    pub receipt_number: Option<Scalar>,
    #[serde(default)]
    pub cashier: Option<Scalar>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub name: Option<Scalar>,
    #[serde(default)]
    pub quantity: Option<Scalar>,
    #[serde(default)]
    pub price: Option<Scalar>,
    #[serde(default)]
    pub total: Option<Scalar>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    #[serde(default)]
    pub subtotal: Option<Scalar>,
    #[serde(default)]
    pub tax_amount: Option<Scalar>,
    #[serde(default)]
    pub tax_rate: Option<Scalar>,
    #[serde(default)]
    pub total: Option<Scalar>,
    #[serde(default)]
    pub discount: Option<Scalar>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default)]
    pub method: Option<Scalar>,
    #[serde(default)]
    pub amount_paid: Option<Scalar>,
    #[serde(default)]
    pub change_given: Option<Scalar>,
}

/// 单张小票的识别结果: 清洗后的 JSON 对象原样保存并原样返回,
/// 排版和汇总通过下面的类型化视图读取. 所有字段均可缺失 (缺失 = 未知)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptSummary(Map<String, Value>);

pub const UNPARSEABLE_RESPONSE: &str = "Could not parse AI response as JSON";

impl ReceiptSummary {
    /// 从已清洗的 JSON 构建; 非对象输入得到空摘要
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// 解析失败时的降级摘要
    pub fn unparsed(raw: &str) -> Self {
        let mut map = Map::new();
        map.insert("raw_response".to_string(), Value::String(raw.to_string()));
        map.insert(
            "error".to_string(),
            Value::String(UNPARSEABLE_RESPONSE.to_string()),
        );
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// 按结构读取某一段; 类型不符时视为缺失, 原值仍保留在摘要中
    fn section<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.0.get(key)? {
            value @ Value::Object(_) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }

    pub fn merchant(&self) -> Option<Merchant> {
        self.section("merchant")
    }

    pub fn transaction(&self) -> Option<Transaction> {
        self.section("transaction")
    }

    pub fn totals(&self) -> Option<Totals> {
        self.section("totals")
    }

    pub fn payment(&self) -> Option<Payment> {
        self.section("payment")
    }

    /// 明细逐条宽松读取, 条数与原数组一致
    pub fn items(&self) -> Vec<LineItem> {
        match self.0.get("items") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| serde_json::from_value(v.clone()).unwrap_or_default())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn item_count(&self) -> usize {
        match self.0.get("items") {
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }

    pub fn merchant_name(&self) -> Option<String> {
        self.merchant()?.name?.as_text()
    }

    pub fn date(&self) -> Option<String> {
        self.transaction()?.date?.as_text()
    }

    pub fn total(&self) -> Option<Scalar> {
        self.totals()?.total
    }

    /// 汇总用总额, 缺失或非数字为 0
    pub fn total_amount(&self) -> f64 {
        self.total().map(|t| t.amount()).unwrap_or(0.0)
    }

    pub fn raw_response(&self) -> Option<&str> {
        self.0.get("raw_response")?.as_str()
    }

    pub fn error(&self) -> Option<&str> {
        self.0.get("error")?.as_str()
    }
}

/// 单个上传文件的处理结果: 成功带摘要, 失败带错误信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub filename: String,
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisOutcome {
    Summary(ReceiptSummary),
    Error(String),
}

impl AnalysisResult {
    pub fn summary(&self) -> Option<&ReceiptSummary> {
        match &self.outcome {
            AnalysisOutcome::Summary(s) => Some(s),
            AnalysisOutcome::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, AnalysisOutcome::Error(_))
    }
}
