// 该文件是 Yebing （叶病） 项目的一部分。
// src/task.rs - 推理任务
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

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
  mpsc,
};
use std::{thread, time::Duration};
use tracing::{error, info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一帧，推理失败直接返回错误
pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧重复推理，统计平均耗时
pub struct RepeatShotTask {
  repeat: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat: 1000 }
  }
}

impl RepeatShotTask {
  /// 前两次视为预热，不计入平均值
  const WARMUP: usize = 2;

  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat.max(1);
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat);
    let mut last = None;
    for i in 0..self.repeat {
      let now = std::time::Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
      last = Some(result);
    }

    if let Some(result) = last {
      output.render_result(&frame, &result)?;
    }

    let measured = if times.len() > Self::WARMUP {
      &times[Self::WARMUP..]
    } else {
      &times[..]
    };
    warn!(
      "平均推理时间: {:.2?}",
      measured.iter().sum::<Duration>() / measured.len() as u32
    );

    Ok(())
  }
}

/// 逐帧处理所有输入
///
/// 推理在独立的工作线程中进行，结果通过通道交回调用线程渲染。
/// 单帧推理失败只记录日志，不影响后续帧。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  stop: Arc<AtomicBool>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 置位后任务在当前帧结束时退出
  pub fn stop_flag(&self) -> Arc<AtomicBool> {
    self.stop.clone()
  }
}

/// 设置进程级 Ctrl-C 处理函数，收到信号后置位 `stop`
///
/// 每个进程只能设置一次，由可执行程序在启动任务前调用。
/// 置位 30 秒后仍未退出则强制结束进程。
pub fn install_interrupt_handler(stop: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    stop.store(true, Ordering::SeqCst);
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
}

impl<
  F: Send + 'static,
  D: Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F> + Send + 'static,
  M: Model<Input = F, Output = D, Error = ME> + Send + 'static,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");

    let (tx, rx) = mpsc::sync_channel::<(usize, F, Result<D, ME>)>(1);
    let stop = self.stop.clone();
    let frame_number = self.frame_number;

    let worker = thread::Builder::new()
      .name("yebing-infer".to_string())
      .spawn(move || {
        let mut frame_index = 0usize;
        for frame in input {
          if stop.load(Ordering::SeqCst) {
            warn!("中断信号接收，退出任务循环");
            break;
          }
          frame_index += 1;
          info!("处理第 {} 帧图像", frame_index);
          let now = std::time::Instant::now();
          let result = model.infer(&frame);
          info!("推理完成，耗时: {:.2?}", now.elapsed());
          if tx.send((frame_index, frame, result)).is_err() {
            break;
          }
          if frame_number.map(|n| frame_index >= n).unwrap_or(false) {
            info!("达到指定帧数 {}, 退出任务循环", frame_index);
            break;
          }
        }
      })?;

    let mut failed = 0usize;
    let mut rendered = 0usize;
    let mut render_error = None;
    for (frame_index, frame, result) in rx.iter() {
      match result {
        Ok(result) => {
          if let Err(e) = output.render_result(&frame, &result) {
            render_error = Some(e);
            break;
          }
          rendered += 1;
        }
        Err(e) => {
          error!("第 {} 帧推理失败: {}", frame_index, e);
          failed += 1;
        }
      }
    }
    // 渲染出错时 rx 被丢弃，工作线程在下一次发送时退出
    drop(rx);

    if worker.join().is_err() {
      return Err(anyhow::anyhow!("推理线程异常退出"));
    }
    if let Some(e) = render_error {
      return Err(e.into());
    }

    info!("任务完成，渲染 {} 帧，失败 {} 帧", rendered, failed);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use thiserror::Error;

  use super::*;

  #[derive(Debug, Error)]
  #[error("odd frame {0}")]
  struct OddFrame(u32);

  #[derive(Debug, Error)]
  #[error("render refused")]
  struct Refused;

  /// 偶数帧返回自身的两倍，奇数帧报错
  struct Doubler;

  impl Model for Doubler {
    type Input = u32;
    type Output = u32;
    type Error = OddFrame;

    fn infer(&self, input: &u32) -> Result<u32, OddFrame> {
      if input % 2 == 0 {
        Ok(input * 2)
      } else {
        Err(OddFrame(*input))
      }
    }
  }

  #[derive(Default)]
  struct Collect {
    seen: RefCell<Vec<(u32, u32)>>,
    refuse_after: Option<usize>,
  }

  impl Render<u32, u32> for &Collect {
    type Error = Refused;

    fn render_result(&self, frame: &u32, result: &u32) -> Result<(), Refused> {
      let mut seen = self.seen.borrow_mut();
      if self.refuse_after.is_some_and(|n| seen.len() >= n) {
        return Err(Refused);
      }
      seen.push((*frame, *result));
      Ok(())
    }
  }

  #[test]
  fn one_shot_uses_first_frame() {
    let output = Collect::default();
    OneShotTask
      .run_task(vec![4u32, 6].into_iter(), Doubler, &output)
      .unwrap();
    assert_eq!(*output.seen.borrow(), vec![(4, 8)]);
  }

  #[test]
  fn one_shot_propagates_inference_error() {
    let output = Collect::default();
    let result = OneShotTask.run_task(vec![3u32].into_iter(), Doubler, &output);
    assert!(result.is_err());
    assert!(output.seen.borrow().is_empty());
  }

  #[test]
  fn one_shot_without_input_fails() {
    let output = Collect::default();
    let result = OneShotTask.run_task(Vec::<u32>::new().into_iter(), Doubler, &output);
    assert!(result.is_err());
  }

  #[test]
  fn repeat_shot_renders_once() {
    let output = Collect::default();
    RepeatShotTask::default()
      .with_repeat(5)
      .run_task(vec![2u32].into_iter(), Doubler, &output)
      .unwrap();
    assert_eq!(*output.seen.borrow(), vec![(2, 4)]);
  }

  #[test]
  fn continuous_skips_failed_frames() {
    let output = Collect::default();
    ContinuousTask::default()
      .run_task(vec![2u32, 3, 4, 5, 6].into_iter(), Doubler, &output)
      .unwrap();
    assert_eq!(*output.seen.borrow(), vec![(2, 4), (4, 8), (6, 12)]);
  }

  #[test]
  fn continuous_honours_frame_number() {
    let output = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(vec![2u32, 4, 6, 8].into_iter(), Doubler, &output)
      .unwrap();
    assert_eq!(*output.seen.borrow(), vec![(2, 4), (4, 8)]);
  }

  #[test]
  fn continuous_stops_when_flag_set() {
    let output = Collect::default();
    let task = ContinuousTask::default();
    task.stop_flag().store(true, Ordering::SeqCst);
    task
      .run_task(vec![2u32, 4].into_iter(), Doubler, &output)
      .unwrap();
    assert!(output.seen.borrow().is_empty());
  }

  #[test]
  fn stop_flags_are_per_task() {
    let stopped = ContinuousTask::default();
    stopped.stop_flag().store(true, Ordering::SeqCst);

    for _ in 0..2 {
      let output = Collect::default();
      ContinuousTask::default()
        .run_task(vec![2u32, 4].into_iter(), Doubler, &output)
        .unwrap();
      assert_eq!(*output.seen.borrow(), vec![(2, 4), (4, 8)]);
    }
  }

  #[test]
  fn continuous_returns_render_error() {
    let output = Collect {
      refuse_after: Some(1),
      ..Default::default()
    };
    let result = ContinuousTask::default().run_task(
      (0u32..100).map(|i| i * 2),
      Doubler,
      &output,
    );
    assert!(result.is_err());
    assert_eq!(output.seen.borrow().len(), 1);
  }
}
