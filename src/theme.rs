// 该文件是 MVision （目标识别报告） 项目的一部分。
// src/theme.rs - 主题与情报参考资料
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 MVision Authors

use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
  #[default]
  Army,
  Iaf,
}

/// 参考资料条目，image_file 为相对资源目录的文件名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntelAsset {
  pub image_file: &'static str,
  pub caption: &'static str,
  pub facts: &'static [(&'static str, &'static str)],
}

const ARMY_ASSETS: [IntelAsset; 2] = [
  IntelAsset {
    image_file: "Bhisma.png",
    caption: "T-90 Bhishma MBT",
    facts: &[
      ("Type", "Main Battle Tank"),
      ("Origin", "Russia / India"),
      ("Armament", "125mm Smoothbore Gun"),
      ("Role", "Armored Spearhead"),
    ],
  },
  IntelAsset {
    image_file: "Arjun.png",
    caption: "Arjun MK1-A",
    facts: &[
      ("Type", "Main Battle Tank"),
      ("Origin", "DRDO, India"),
      ("Feature", "Kanchan Armour"),
      ("Role", "Heavy Firepower"),
    ],
  },
];

const IAF_ASSETS: [IntelAsset; 2] = [
  IntelAsset {
    image_file: "Dassault Rafale.jpg",
    caption: "Dassault Rafale",
    facts: &[
      ("Type", "Multirole Fighter"),
      ("Origin", "France"),
      ("Role", "Air Supremacy / Nuclear Deterrence"),
    ],
  },
  IntelAsset {
    image_file: "tejs.webp",
    caption: "HAL Tejas",
    facts: &[
      ("Type", "Light Combat Aircraft (LCA)"),
      ("Origin", "HAL, India"),
      ("Role", "Delta-wing Multirole Combat"),
    ],
  },
];

impl Theme {
  pub fn subtitle(&self) -> &'static str {
    match self {
      Theme::Army => "Advanced Military Object Recognition System",
      Theme::Iaf => "Indian Air Force :: Aerial Threat Detection System",
    }
  }

  pub fn intel_assets(&self) -> &'static [IntelAsset] {
    match self {
      Theme::Army => &ARMY_ASSETS,
      Theme::Iaf => &IAF_ASSETS,
    }
  }
}

impl fmt::Display for Theme {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Theme::Army => write!(f, "Army"),
      Theme::Iaf => write!(f, "IAF"),
    }
  }
}

impl FromStr for Theme {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "army" => Ok(Theme::Army),
      "iaf" => Ok(Theme::Iaf),
      other => Err(format!("未知主题: {}（可选 army, iaf）", other)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_is_case_insensitive() {
    assert_eq!("Army".parse::<Theme>().unwrap(), Theme::Army);
    assert_eq!("IAF".parse::<Theme>().unwrap(), Theme::Iaf);
    assert!("navy".parse::<Theme>().is_err());
  }

  #[test]
  fn each_theme_has_its_own_assets() {
    let army: Vec<_> = Theme::Army.intel_assets().iter().map(|a| a.caption).collect();
    assert_eq!(army, ["T-90 Bhishma MBT", "Arjun MK1-A"]);

    let iaf: Vec<_> = Theme::Iaf.intel_assets().iter().map(|a| a.image_file).collect();
    assert_eq!(iaf, ["Dassault Rafale.jpg", "tejs.webp"]);

    assert!(
      Theme::Iaf
        .intel_assets()
        .iter()
        .all(|a| a.facts.iter().any(|(k, _)| *k == "Role"))
    );
  }

  #[test]
  fn subtitles_differ() {
    assert_ne!(Theme::Army.subtitle(), Theme::Iaf.subtitle());
    assert_eq!(Theme::default(), Theme::Army);
  }
}
