// 该文件是 Yebing （叶病） 项目的一部分。
// src/model/disease.rs - 病害类别与说明
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use super::{CLASS_NUM, WithLabel};

/// 病害说明，英文与泰米尔文各一份
#[derive(Debug, PartialEq, Eq)]
pub struct DiseaseRecord {
  pub name: &'static str,
  pub note_english: &'static str,
  pub note_tamil: &'static str,
}

/// 按模型输出顺序排列
pub static DISEASE_CATALOG: [DiseaseRecord; CLASS_NUM] = [
  DiseaseRecord {
    name: "Corn Common Rust",
    note_english: "Caused by the fungus Puccinia sorghi...",
    note_tamil: "Puccinia sorghi...",
  },
  DiseaseRecord {
    name: "Tomato Mosaic Virus",
    note_english: "Caused by the Tomato mosaic virus...",
    note_tamil: "Tomato Mosaic Virus...",
  },
  DiseaseRecord {
    name: "Apple Black Rot",
    note_english: "Caused by the fungus Botryosphaeria obtusa...",
    note_tamil: "Apple Black Rot...",
  },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlantDisease {
  CornCommonRust,
  TomatoMosaicVirus,
  AppleBlackRot,
}

impl PlantDisease {
  pub const ALL: [PlantDisease; CLASS_NUM] = [
    PlantDisease::CornCommonRust,
    PlantDisease::TomatoMosaicVirus,
    PlantDisease::AppleBlackRot,
  ];

  pub fn index(self) -> usize {
    self as usize
  }

  pub fn record(self) -> &'static DiseaseRecord {
    &DISEASE_CATALOG[self.index()]
  }
}

impl WithLabel for PlantDisease {
  fn to_label_str(&self) -> String {
    self.record().name.to_string()
  }

  fn to_label_id(&self) -> u32 {
    self.index() as u32
  }

  /// 超出范围的编号归为第 0 类
  fn from_label_id(id: u32) -> Self {
    match id {
      1 => PlantDisease::TomatoMosaicVirus,
      2 => PlantDisease::AppleBlackRot,
      _ => PlantDisease::CornCommonRust,
    }
  }
}
