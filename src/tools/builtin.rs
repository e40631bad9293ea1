//! Built-in demo tools
//!
//! Small, side-effect-free tools used by the CLI and in classroom demos:
//! an arithmetic calculator and canned weather lookups.

use super::{ToolError, ToolExecutor, ToolInput, ToolRegistry};
use async_trait::async_trait;
use std::sync::Arc;

/// Register `calculator`, `weather_data` and `rain_chance`
pub fn register_builtin_tools(registry: &mut ToolRegistry) {
    registry.register(
        "calculator",
        "Evaluate an arithmetic expression, e.g. \"(2 + 3) * 4\". Supports + - * / % ^ and parentheses.",
        Arc::new(Calculator),
    );
    registry.register(
        "weather_data",
        "Get the current temperature and conditions for a location, e.g. \"Sydney\".",
        Arc::new(WeatherData),
    );
    registry.register(
        "rain_chance",
        "Get the chance of rain today for a location, e.g. \"Melbourne\".",
        Arc::new(RainChance),
    );
}

/// Reads the argument from a text input or from `key` in an object input
fn argument(input: &ToolInput, key: &str) -> Result<String, ToolError> {
    let value = match input {
        ToolInput::Text(text) => text.clone(),
        ToolInput::Object(_) => input
            .get_str(key)
            .map(str::to_string)
            .ok_or_else(|| ToolError::Failed(format!("expected a '{}' value", key)))?,
    };
    let value = value.trim();
    if value.is_empty() {
        return Err(ToolError::Failed(format!("'{}' must not be empty", key)));
    }
    Ok(value.to_string())
}

/// Arithmetic expression evaluator
pub struct Calculator;

#[async_trait]
impl ToolExecutor for Calculator {
    async fn execute(&self, input: ToolInput) -> Result<String, ToolError> {
        let expression = argument(&input, "expression")?;
        let value = evaluate(&expression).map_err(ToolError::Failed)?;
        Ok(format_number(value))
    }
}

/// Evaluate an arithmetic expression
///
/// Precedence from loosest to tightest: `+ -`, `* / %`, unary minus, `^`
/// (right associative).
///
/// # Errors
///
/// Returns a description of the problem for malformed input, division by
/// zero, nesting deeper than 256 levels, or a non-finite result
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let mut parser = ExprParser {
        chars: expression.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(c) = parser.peek() {
        return Err(format!("unexpected '{}' in expression", c));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(value)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Deepest nesting of parentheses, signs and exponents accepted
const MAX_NESTING: usize = 256;

struct ExprParser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        loop {
            if self.eat('*') {
                value *= self.unary()?;
            } else if self.eat('/') {
                let divisor = self.unary()?;
                if divisor == 0.0 {
                    return Err("division by zero".to_string());
                }
                value /= divisor;
            } else if self.eat('%') {
                let divisor = self.unary()?;
                if divisor == 0.0 {
                    return Err("modulo by zero".to_string());
                }
                value %= divisor;
            } else {
                return Ok(value);
            }
        }
    }

    fn unary(&mut self) -> Result<f64, String> {
        if self.depth >= MAX_NESTING {
            return Err("expression nested too deeply".to_string());
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64, String> {
        if self.eat('-') {
            Ok(-self.unary()?)
        } else if self.eat('+') {
            self.unary()
        } else {
            self.power()
        }
    }

    fn power(&mut self) -> Result<f64, String> {
        let base = self.primary()?;
        if self.eat('^') {
            let exponent = self.unary()?;
            Ok(base.powf(exponent))
        } else {
            Ok(base)
        }
    }

    fn primary(&mut self) -> Result<f64, String> {
        if self.eat('(') {
            let value = self.expr()?;
            if !self.eat(')') {
                return Err("missing closing parenthesis".to_string());
            }
            return Ok(value);
        }

        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        if start == self.pos {
            return match self.peek() {
                Some(c) => Err(format!("unexpected '{}' in expression", c)),
                None => Err("unexpected end of expression".to_string()),
            };
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| format!("invalid number '{}'", literal))
    }
}

struct DemoWeather {
    location: &'static str,
    temperature_c: i32,
    conditions: &'static str,
    humidity: u8,
    rain_chance: u8,
}

const DEMO_WEATHER: &[DemoWeather] = &[
    DemoWeather {
        location: "Sydney",
        temperature_c: 22,
        conditions: "sunny",
        humidity: 60,
        rain_chance: 10,
    },
    DemoWeather {
        location: "Melbourne",
        temperature_c: 16,
        conditions: "cloudy",
        humidity: 70,
        rain_chance: 40,
    },
    DemoWeather {
        location: "Brisbane",
        temperature_c: 27,
        conditions: "humid with storms later",
        humidity: 78,
        rain_chance: 60,
    },
    DemoWeather {
        location: "Perth",
        temperature_c: 25,
        conditions: "clear",
        humidity: 45,
        rain_chance: 5,
    },
    DemoWeather {
        location: "London",
        temperature_c: 14,
        conditions: "overcast",
        humidity: 80,
        rain_chance: 65,
    },
    DemoWeather {
        location: "Chicago",
        temperature_c: 12,
        conditions: "windy",
        humidity: 55,
        rain_chance: 20,
    },
    DemoWeather {
        location: "New York",
        temperature_c: 18,
        conditions: "partly cloudy",
        humidity: 62,
        rain_chance: 25,
    },
];

fn lookup_weather(input: &ToolInput) -> Result<&'static DemoWeather, ToolError> {
    let location = argument(input, "location")?;
    DEMO_WEATHER
        .iter()
        .find(|w| w.location.eq_ignore_ascii_case(&location))
        .ok_or_else(|| {
            let known: Vec<&str> = DEMO_WEATHER.iter().map(|w| w.location).collect();
            ToolError::Failed(format!(
                "no weather data for '{}'. Known locations: {}",
                location,
                known.join(", ")
            ))
        })
}

/// Canned current conditions
pub struct WeatherData;

#[async_trait]
impl ToolExecutor for WeatherData {
    async fn execute(&self, input: ToolInput) -> Result<String, ToolError> {
        let weather = lookup_weather(&input)?;
        Ok(format!(
            "Weather in {}: {}°C, {}, humidity {}%",
            weather.location, weather.temperature_c, weather.conditions, weather.humidity
        ))
    }
}

/// Canned chance of rain
pub struct RainChance;

#[async_trait]
impl ToolExecutor for RainChance {
    async fn execute(&self, input: ToolInput) -> Result<String, ToolError> {
        let weather = lookup_weather(&input)?;
        Ok(format!(
            "Chance of rain in {} today: {}%",
            weather.location, weather.rain_chance
        ))
    }
}
